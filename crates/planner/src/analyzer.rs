use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use stq_common::{Result, StqError};

use crate::logical_plan::{AggExpr, BinaryOp, Expr, LiteralValue, LogicalPlan};

/// Source of named relations for the analyzer.
/// The compiler session provides this from its catalog.
pub trait RelationProvider {
    /// Return the plan registered under `name`.
    fn relation_plan(&self, name: &str) -> Result<LogicalPlan>;
}

/// Pluggable analysis step of the compile pipeline.
pub trait PlanAnalyzer: Send + Sync {
    /// Resolve names and types of `plan` against `relations`.
    fn analyze(&self, plan: LogicalPlan, relations: &dyn RelationProvider) -> Result<LogicalPlan>;

    /// Output schema of an already analyzed plan.
    fn output_schema(&self, plan: &LogicalPlan) -> Result<SchemaRef>;
}

/// Logical-plan semantic analyzer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Analyzer;

struct NoRelations;

impl RelationProvider for NoRelations {
    fn relation_plan(&self, name: &str) -> Result<LogicalPlan> {
        Err(StqError::unresolved("table", name))
    }
}

impl Analyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyze a logical plan and return a semantically validated plan.
    ///
    /// Guarantees:
    /// - `TableScan` references are replaced by the catalog plan, aliased by name;
    /// - unresolved `Expr::Column` references become `Expr::ColumnRef`;
    /// - expression/aggregate types are inferred and checked;
    /// - required casts are inserted for supported coercions.
    ///
    /// Analyzing an analyzed plan returns it unchanged.
    pub fn analyze(
        &self,
        plan: LogicalPlan,
        relations: &dyn RelationProvider,
    ) -> Result<LogicalPlan> {
        let mut scope = Scope {
            relations,
            expanding: vec![],
        };
        let (p, _schema, _resolver) = self.analyze_plan(plan, &mut scope)?;
        Ok(p)
    }

    /// Output schema of a plan that needs no catalog (already analyzed, or built only from
    /// stream/local leaves).
    pub fn output_schema(&self, plan: &LogicalPlan) -> Result<SchemaRef> {
        let mut scope = Scope {
            relations: &NoRelations,
            expanding: vec![],
        };
        let (_p, schema, _resolver) = self.analyze_plan(plan.clone(), &mut scope)?;
        Ok(schema)
    }

    fn analyze_plan(
        &self,
        plan: LogicalPlan,
        scope: &mut Scope<'_>,
    ) -> Result<(LogicalPlan, SchemaRef, Resolver)> {
        match plan {
            LogicalPlan::TableScan { table } => {
                if scope.expanding.contains(&table) {
                    return Err(StqError::Analysis {
                        message: format!("relation {table} refers to itself"),
                        symbol: Some(table),
                    });
                }
                let registered = scope.relations.relation_plan(&table).map_err(|e| match e {
                    StqError::NotFound(_) => StqError::unresolved("table", table.clone()),
                    other => other,
                })?;
                scope.expanding.push(table.clone());
                let analyzed = self.analyze_plan(registered, scope);
                scope.expanding.pop();
                let (ain, schema, _resolver) = analyzed?;

                let alias = table.rsplit('.').next().unwrap_or(&table).to_string();
                let resolver = Resolver::from_table(&alias, schema.clone());
                Ok((
                    LogicalPlan::SubqueryAlias {
                        alias,
                        input: Box::new(ain),
                    },
                    schema,
                    resolver,
                ))
            }

            LogicalPlan::StreamScan {
                source,
                schema,
                projection,
                filters,
                window,
            } => {
                let mut resolver = Resolver::from_table(&source, schema.clone());

                // Pushed filters are evaluated against the full source schema.
                let mut analyzed_filters = vec![];
                for f in filters {
                    let (af, t) = self.analyze_expr(f, &resolver)?;
                    if t != DataType::Boolean {
                        return Err(StqError::analysis("stream scan filter must be boolean"));
                    }
                    analyzed_filters.push(af);
                }

                let out_schema = match &projection {
                    Some(cols) => {
                        let (proj_schema, proj_resolver) = resolver.project(cols)?;
                        resolver = proj_resolver;
                        proj_schema
                    }
                    None => resolver.schema(),
                };
                Ok((
                    LogicalPlan::StreamScan {
                        source,
                        schema,
                        projection,
                        filters: analyzed_filters,
                        window,
                    },
                    out_schema,
                    resolver,
                ))
            }

            LogicalPlan::LocalRelation { schema, rows } => {
                if let Some(bad) = rows.iter().find(|r| r.len() != schema.fields().len()) {
                    return Err(StqError::analysis(format!(
                        "local relation row has {} values, schema has {} fields",
                        bad.len(),
                        schema.fields().len()
                    )));
                }
                let resolver = Resolver::anonymous(schema.clone());
                Ok((
                    LogicalPlan::LocalRelation {
                        schema: schema.clone(),
                        rows,
                    },
                    schema,
                    resolver,
                ))
            }

            LogicalPlan::SubqueryAlias { alias, input } => {
                let (ain, schema, _resolver) = self.analyze_plan(*input, scope)?;
                let resolver = Resolver::from_table(&alias, schema.clone());
                Ok((
                    LogicalPlan::SubqueryAlias {
                        alias,
                        input: Box::new(ain),
                    },
                    schema,
                    resolver,
                ))
            }

            LogicalPlan::Filter { predicate, input } => {
                let (ain, schema, resolver) = self.analyze_plan(*input, scope)?;
                let (pred, t) = self.analyze_expr(predicate, &resolver)?;
                if t != DataType::Boolean {
                    return Err(StqError::analysis("WHERE predicate must be boolean"));
                }
                Ok((
                    LogicalPlan::Filter {
                        predicate: pred,
                        input: Box::new(ain),
                    },
                    schema,
                    resolver,
                ))
            }

            LogicalPlan::Projection { exprs, input } => {
                let (ain, _in_schema, in_resolver) = self.analyze_plan(*input, scope)?;

                let mut out_fields: Vec<Field> = vec![];
                let mut out_exprs: Vec<(Expr, String)> = vec![];

                for (e, name) in exprs {
                    let (ae, dt) = self.analyze_expr(e, &in_resolver)?;
                    let nullable = in_resolver.expr_nullable(&ae);
                    out_fields.push(Field::new(&name, dt, nullable));
                    out_exprs.push((ae, name));
                }

                let out_schema = Arc::new(Schema::new(out_fields));
                let out_resolver = Resolver::anonymous(out_schema.clone());

                Ok((
                    LogicalPlan::Projection {
                        exprs: out_exprs,
                        input: Box::new(ain),
                    },
                    out_schema,
                    out_resolver,
                ))
            }

            LogicalPlan::Aggregate {
                group_exprs,
                aggr_exprs,
                input,
                mode,
            } => {
                let (ain, _in_schema, in_resolver) = self.analyze_plan(*input, scope)?;

                let mut out_fields: Vec<Field> = vec![];
                let mut out_group: Vec<Expr> = vec![];
                for g in group_exprs {
                    let (ag, dt) = self.analyze_expr(g, &in_resolver)?;
                    let nullable = in_resolver.expr_nullable(&ag);
                    out_fields.push(Field::new(expr_name(&ag), dt, nullable));
                    out_group.push(ag);
                }

                let mut out_aggs: Vec<(AggExpr, String)> = vec![];
                for (agg, name) in aggr_exprs {
                    let (aagg, dt) = self.analyze_agg(agg, &in_resolver)?;
                    let nullable = !matches!(aagg, AggExpr::Count(_));
                    out_fields.push(Field::new(&name, dt, nullable));
                    out_aggs.push((aagg, name));
                }

                let out_schema = Arc::new(Schema::new(out_fields));
                let out_resolver = Resolver::anonymous(out_schema.clone());

                Ok((
                    LogicalPlan::Aggregate {
                        group_exprs: out_group,
                        aggr_exprs: out_aggs,
                        input: Box::new(ain),
                        mode,
                    },
                    out_schema,
                    out_resolver,
                ))
            }

            LogicalPlan::Join {
                left,
                right,
                on,
                join_type,
            } => {
                let (al, _ls, lres) = self.analyze_plan(*left, scope)?;
                let (ar, _rs, rres) = self.analyze_plan(*right, scope)?;

                // Validate join keys exist and have compatible types.
                for (lk, rk) in &on {
                    let (_li, ldt) = lres.resolve(lk)?;
                    let (_ri, rdt) = rres.resolve(rk)?;
                    if !types_compatible_for_equality(&ldt, &rdt) {
                        return Err(StqError::analysis(format!(
                            "join key type mismatch: {lk}({ldt:?}) vs {rk}({rdt:?})"
                        )));
                    }
                }

                let out_resolver = Resolver::join(lres, rres);
                let out_schema = out_resolver.schema();

                Ok((
                    LogicalPlan::Join {
                        left: Box::new(al),
                        right: Box::new(ar),
                        on,
                        join_type,
                    },
                    out_schema,
                    out_resolver,
                ))
            }

            LogicalPlan::Limit { n, input } => {
                let (ain, schema, resolver) = self.analyze_plan(*input, scope)?;
                Ok((
                    LogicalPlan::Limit {
                        n,
                        input: Box::new(ain),
                    },
                    schema,
                    resolver,
                ))
            }

            LogicalPlan::Window { spec, input } => {
                let (ain, schema, resolver) = self.analyze_plan(*input, scope)?;
                Ok((
                    LogicalPlan::Window {
                        spec,
                        input: Box::new(ain),
                    },
                    schema,
                    resolver,
                ))
            }
        }
    }

    fn analyze_agg(&self, agg: AggExpr, resolver: &Resolver) -> Result<(AggExpr, DataType)> {
        match agg {
            AggExpr::Count(e) => {
                let (ae, _dt) = self.analyze_expr(e, resolver)?;
                Ok((AggExpr::Count(ae), DataType::Int64))
            }
            AggExpr::Sum(e) => {
                let (ae, dt) = self.analyze_expr(e, resolver)?;
                if !is_numeric(&dt) {
                    return Err(StqError::analysis("SUM() requires numeric"));
                }
                Ok((AggExpr::Sum(ae), dt))
            }
            AggExpr::Min(e) => {
                let (ae, dt) = self.analyze_expr(e, resolver)?;
                Ok((AggExpr::Min(ae), dt))
            }
            AggExpr::Max(e) => {
                let (ae, dt) = self.analyze_expr(e, resolver)?;
                Ok((AggExpr::Max(ae), dt))
            }
            AggExpr::Avg(e) => {
                let (ae, dt) = self.analyze_expr(e, resolver)?;
                if !is_numeric(&dt) {
                    return Err(StqError::analysis("AVG() requires numeric"));
                }
                Ok((AggExpr::Avg(ae), DataType::Float64))
            }
        }
    }

    fn analyze_expr(&self, expr: Expr, resolver: &Resolver) -> Result<(Expr, DataType)> {
        match expr {
            Expr::Column(name) => {
                let (idx, dt) = resolver.resolve(&name)?;
                Ok((Expr::ColumnRef { name, index: idx }, dt))
            }
            Expr::ColumnRef { name, index } => {
                let dt = resolver.data_type_at(index)?;
                Ok((Expr::ColumnRef { name, index }, dt))
            }
            Expr::Literal(v) => {
                let dt = literal_type(&v);
                Ok((Expr::Literal(v), dt))
            }
            Expr::Cast { expr, to_type } => {
                let (ae, _dt) = self.analyze_expr(*expr, resolver)?;
                Ok((
                    Expr::Cast {
                        expr: Box::new(ae),
                        to_type: to_type.clone(),
                    },
                    to_type,
                ))
            }
            Expr::And(l, r) => {
                let (al, ar) = self.analyze_boolean_pair(*l, *r, "AND", resolver)?;
                Ok((Expr::And(Box::new(al), Box::new(ar)), DataType::Boolean))
            }
            Expr::Or(l, r) => {
                let (al, ar) = self.analyze_boolean_pair(*l, *r, "OR", resolver)?;
                Ok((Expr::Or(Box::new(al), Box::new(ar)), DataType::Boolean))
            }
            Expr::Not(e) => {
                let (ae, dt) = self.analyze_expr(*e, resolver)?;
                if dt != DataType::Boolean {
                    return Err(StqError::analysis("NOT requires boolean operand"));
                }
                Ok((Expr::Not(Box::new(ae)), DataType::Boolean))
            }
            Expr::IsNull(e) => {
                let (ae, _dt) = self.analyze_expr(*e, resolver)?;
                Ok((Expr::IsNull(Box::new(ae)), DataType::Boolean))
            }
            Expr::IsNotNull(e) => {
                let (ae, _dt) = self.analyze_expr(*e, resolver)?;
                Ok((Expr::IsNotNull(Box::new(ae)), DataType::Boolean))
            }
            Expr::BinaryOp { left, op, right } => {
                let (al, ldt) = self.analyze_expr(*left, resolver)?;
                let (ar, rdt) = self.analyze_expr(*right, resolver)?;

                match op {
                    // comparisons -> boolean, plus numeric widening / string unify
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => {
                        let (cl, cr, _common) = coerce_for_compare(al, ldt, ar, rdt)?;
                        Ok((
                            Expr::BinaryOp {
                                left: Box::new(cl),
                                op,
                                right: Box::new(cr),
                            },
                            DataType::Boolean,
                        ))
                    }

                    // arithmetic -> numeric result
                    BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                        let (cl, cr, out) = coerce_for_arith(op, al, ldt, ar, rdt)?;
                        Ok((
                            Expr::BinaryOp {
                                left: Box::new(cl),
                                op,
                                right: Box::new(cr),
                            },
                            out,
                        ))
                    }
                }
            }
        }
    }

    fn analyze_boolean_pair(
        &self,
        l: Expr,
        r: Expr,
        what: &str,
        resolver: &Resolver,
    ) -> Result<(Expr, Expr)> {
        let (al, ldt) = self.analyze_expr(l, resolver)?;
        let (ar, rdt) = self.analyze_expr(r, resolver)?;
        if ldt != DataType::Boolean || rdt != DataType::Boolean {
            return Err(StqError::analysis(format!(
                "{what} requires boolean operands"
            )));
        }
        Ok((al, ar))
    }
}

impl PlanAnalyzer for Analyzer {
    fn analyze(&self, plan: LogicalPlan, relations: &dyn RelationProvider) -> Result<LogicalPlan> {
        Analyzer::analyze(self, plan, relations)
    }

    fn output_schema(&self, plan: &LogicalPlan) -> Result<SchemaRef> {
        Analyzer::output_schema(self, plan)
    }
}

struct Scope<'a> {
    relations: &'a dyn RelationProvider,
    /// Catalog names currently being expanded, innermost last.
    expanding: Vec<String>,
}

// -------------------------
// Resolver (name -> idx, dt)
// -------------------------

#[derive(Debug, Clone)]
struct Relation {
    name: String,
    fields: Vec<Arc<Field>>,
}

#[derive(Debug, Clone)]
struct Resolver {
    relations: Vec<Relation>,
}

impl Resolver {
    fn from_table(table: &str, schema: SchemaRef) -> Self {
        Self {
            relations: vec![Relation {
                name: table.to_string(),
                fields: schema.fields().iter().cloned().collect(),
            }],
        }
    }

    fn anonymous(schema: SchemaRef) -> Self {
        Self::from_table("", schema)
    }

    fn join(left: Resolver, right: Resolver) -> Self {
        let mut rels = vec![];
        rels.extend(left.relations);
        rels.extend(right.relations);
        Self { relations: rels }
    }

    fn schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .relations
            .iter()
            .flat_map(|r| r.fields.iter().map(|f| (**f).clone()))
            .collect();
        Arc::new(Schema::new(fields))
    }

    fn project(&self, cols: &[String]) -> Result<(SchemaRef, Resolver)> {
        let mut out_fields = vec![];
        for c in cols {
            let (idx, _dt) = self.resolve(c)?;
            out_fields.push(self.field_at(idx)?);
        }
        let schema = Arc::new(Schema::new(out_fields));
        let name = match self.relations.as_slice() {
            [only] => only.name.as_str(),
            _ => "",
        };
        Ok((schema.clone(), Resolver::from_table(name, schema)))
    }

    /// Qualified names match their relation first; a qualified name that matches no
    /// relation falls back to anonymous relations (outputs of projections/aggregates,
    /// whose fields may carry the qualified text as their name).
    fn resolve(&self, col: &str) -> Result<(usize, DataType)> {
        let (rel_opt, name) = split_qual(col);
        let mut found = self.find(|r| rel_opt.map_or(true, |rel| r.name == rel), name);
        if found.is_empty() && rel_opt.is_some() {
            found = self.find(|r| r.name.is_empty(), col);
            if found.is_empty() {
                found = self.find(|r| r.name.is_empty(), name);
            }
        }

        match found.len() {
            0 => Err(StqError::unresolved("column", col)),
            1 => Ok(found.swap_remove(0)),
            _ => Err(StqError::Analysis {
                message: format!("ambiguous column reference: {col} (use relation.column)"),
                symbol: Some(col.to_string()),
            }),
        }
    }

    fn find(&self, rel_match: impl Fn(&Relation) -> bool, name: &str) -> Vec<(usize, DataType)> {
        let mut found = vec![];
        let mut base = 0usize;
        for r in &self.relations {
            if rel_match(r) {
                for (i, f) in r.fields.iter().enumerate() {
                    if f.name() == name {
                        found.push((base + i, f.data_type().clone()));
                    }
                }
            }
            base += r.fields.len();
        }
        found
    }

    fn field_at(&self, idx: usize) -> Result<Field> {
        let mut base = 0usize;
        for r in &self.relations {
            if idx < base + r.fields.len() {
                return Ok((*r.fields[idx - base]).clone());
            }
            base += r.fields.len();
        }
        Err(StqError::analysis(format!(
            "column index out of range: {idx}"
        )))
    }

    fn data_type_at(&self, idx: usize) -> Result<DataType> {
        Ok(self.field_at(idx)?.data_type().clone())
    }

    fn expr_nullable(&self, e: &Expr) -> bool {
        match e {
            Expr::ColumnRef { index, .. } => {
                self.field_at(*index).map(|f| f.is_nullable()).unwrap_or(true)
            }
            Expr::Literal(LiteralValue::Null) => true,
            Expr::Literal(_) | Expr::IsNull(_) | Expr::IsNotNull(_) => false,
            _ => true,
        }
    }
}

fn split_qual(s: &str) -> (Option<&str>, &str) {
    if let Some((a, b)) = s.split_once('.') {
        (Some(a), b)
    } else {
        (None, s)
    }
}

// -------------------------
// Type inference + casts
// -------------------------

fn literal_type(v: &LiteralValue) -> DataType {
    match v {
        LiteralValue::Int64(_) => DataType::Int64,
        LiteralValue::Float64(_) => DataType::Float64,
        LiteralValue::Utf8(_) => DataType::Utf8,
        LiteralValue::Boolean(_) => DataType::Boolean,
        LiteralValue::Null => DataType::Null,
    }
}

fn is_numeric(dt: &DataType) -> bool {
    numeric_rank(dt).is_some()
}

fn numeric_rank(dt: &DataType) -> Option<u8> {
    Some(match dt {
        DataType::Int8 | DataType::UInt8 => 1,
        DataType::Int16 | DataType::UInt16 => 2,
        DataType::Int32 | DataType::UInt32 => 3,
        DataType::Int64 | DataType::UInt64 => 4,
        DataType::Float32 => 5,
        DataType::Float64 => 6,
        _ => return None,
    })
}

fn wider_numeric(a: &DataType, b: &DataType) -> Option<DataType> {
    let ra = numeric_rank(a)?;
    let rb = numeric_rank(b)?;
    if ra >= rb {
        Some(a.clone())
    } else {
        Some(b.clone())
    }
}

fn cast_if_needed(expr: Expr, from: &DataType, to: &DataType) -> Expr {
    if from == to {
        expr
    } else {
        Expr::Cast {
            expr: Box::new(expr),
            to_type: to.clone(),
        }
    }
}

fn coerce_for_compare(
    left: Expr,
    ldt: DataType,
    right: Expr,
    rdt: DataType,
) -> Result<(Expr, Expr, DataType)> {
    // Null can be cast to the other side.
    if ldt == DataType::Null {
        return Ok((cast_if_needed(left, &ldt, &rdt), right, rdt));
    }
    if rdt == DataType::Null {
        return Ok((left, cast_if_needed(right, &rdt, &ldt), ldt));
    }

    if is_numeric(&ldt) && is_numeric(&rdt) {
        let target = wider_numeric(&ldt, &rdt)
            .ok_or_else(|| StqError::analysis("failed to determine numeric widening type"))?;
        return Ok((
            cast_if_needed(left, &ldt, &target),
            cast_if_needed(right, &rdt, &target),
            target,
        ));
    }

    if ldt == rdt {
        return Ok((left, right, ldt));
    }

    Err(StqError::analysis(format!(
        "cannot compare types {ldt:?} and {rdt:?}"
    )))
}

fn coerce_for_arith(
    op: BinaryOp,
    left: Expr,
    ldt: DataType,
    right: Expr,
    rdt: DataType,
) -> Result<(Expr, Expr, DataType)> {
    if !is_numeric(&ldt) || !is_numeric(&rdt) {
        return Err(StqError::analysis("arithmetic requires numeric operands"));
    }

    // division produces float
    if op == BinaryOp::Divide {
        let target = DataType::Float64;
        return Ok((
            cast_if_needed(left, &ldt, &target),
            cast_if_needed(right, &rdt, &target),
            target,
        ));
    }

    let target =
        wider_numeric(&ldt, &rdt).ok_or_else(|| StqError::analysis("failed numeric widening"))?;
    Ok((
        cast_if_needed(left, &ldt, &target),
        cast_if_needed(right, &rdt, &target),
        target,
    ))
}

fn types_compatible_for_equality(a: &DataType, b: &DataType) -> bool {
    a == b || (is_numeric(a) && is_numeric(b))
}

/// Output field name of a grouping expression.
pub(crate) fn expr_name(e: &Expr) -> &str {
    match e {
        Expr::Column(name) | Expr::ColumnRef { name, .. } => name.as_str(),
        _ => "expr",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema, SchemaRef};
    use stq_common::{Result, StqError};

    use super::{Analyzer, RelationProvider};
    use crate::logical_plan::{Expr, LogicalPlan};
    use crate::sql_frontend::sql_to_logical;

    struct TestRelations {
        plans: HashMap<String, LogicalPlan>,
    }

    impl RelationProvider for TestRelations {
        fn relation_plan(&self, name: &str) -> Result<LogicalPlan> {
            self.plans
                .get(name)
                .cloned()
                .ok_or_else(|| StqError::NotFound(name.to_string()))
        }
    }

    fn words_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("word", DataType::Utf8, false),
            Field::new("n", DataType::Int32, true),
        ]))
    }

    fn relations() -> TestRelations {
        let mut plans = HashMap::new();
        plans.insert(
            "words".to_string(),
            LogicalPlan::stream_scan("words_src", words_schema()),
        );
        TestRelations { plans }
    }

    fn analyze(sql: &str, rel: &TestRelations) -> Result<LogicalPlan> {
        let plan = sql_to_logical(sql, &HashMap::new())?;
        Analyzer::new().analyze(plan, rel)
    }

    #[test]
    fn table_scan_is_replaced_by_aliased_catalog_plan() {
        let analyzed = analyze("SELECT words.word FROM words", &relations()).expect("analyze");
        let LogicalPlan::Projection { exprs, input } = analyzed else {
            panic!("expected projection");
        };
        assert_eq!(
            exprs[0].0,
            Expr::ColumnRef {
                name: "words.word".to_string(),
                index: 0
            }
        );
        assert!(matches!(*input, LogicalPlan::SubqueryAlias { ref alias, .. } if alias == "words"));
    }

    #[test]
    fn unknown_table_and_column_carry_symbol() {
        let err = analyze("SELECT a FROM missing", &relations()).expect_err("unknown table");
        assert_eq!(err.symbol(), Some("missing"));
        let err = analyze("SELECT price FROM words", &relations()).expect_err("unknown column");
        assert_eq!(err.symbol(), Some("price"));
    }

    #[test]
    fn self_referencing_relation_is_rejected() {
        let mut rel = relations();
        rel.plans.insert("loop".to_string(), LogicalPlan::table("loop"));
        let err = analyze("SELECT * FROM loop", &rel).expect_err("recursive");
        assert!(matches!(err, StqError::Analysis { .. }), "{err:?}");
    }

    #[test]
    fn comparison_widens_int32_column() {
        let analyzed = analyze("SELECT word FROM words WHERE n > 3", &relations()).expect("ok");
        let LogicalPlan::Projection { input, .. } = analyzed else {
            panic!("expected projection");
        };
        let LogicalPlan::Filter { predicate, .. } = *input else {
            panic!("expected filter");
        };
        let Expr::BinaryOp { left, .. } = predicate else {
            panic!("expected comparison");
        };
        assert!(matches!(*left, Expr::Cast { to_type: DataType::Int64, .. }));
    }

    #[test]
    fn aggregate_output_schema_and_idempotence() {
        let rel = relations();
        let analyzed = analyze(
            "SELECT word, COUNT(*) AS c, AVG(n) AS a FROM words GROUP BY word",
            &rel,
        )
        .expect("analyze");
        let analyzer = Analyzer::new();
        let schema = analyzer.output_schema(&analyzed).expect("schema");
        assert_eq!(schema.field(0).name(), "word");
        assert!(!schema.field(0).is_nullable());
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert!(!schema.field(1).is_nullable());
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);

        let again = analyzer.analyze(analyzed.clone(), &rel).expect("re-analyze");
        assert_eq!(again, analyzed);
    }

    #[test]
    fn join_key_type_mismatch_is_analysis_error() {
        let mut rel = relations();
        rel.plans.insert(
            "users".to_string(),
            LogicalPlan::stream_scan(
                "users_src",
                Arc::new(Schema::new(vec![Field::new("word", DataType::Boolean, true)])),
            ),
        );
        let err = analyze(
            "SELECT * FROM words JOIN users ON words.word = users.word",
            &rel,
        )
        .expect_err("mismatch");
        assert!(err.to_string().contains("join key type mismatch"), "{err}");
    }
}
