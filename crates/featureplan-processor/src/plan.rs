//! Execution plans
//!
//! An [`ExecutionPlan`] is the ordered list of steps an engine runs to compute
//! a table. Steps are emitted leaf first: every table is scanned or computed
//! before the steps that read it, and each table appears once even when it is
//! reached through several paths (a shared source, a table joined twice).

use chrono::{DateTime, Utc};
use featureplan_core::{
    expr, AggFunc, DataType, Error, Feature, FeatureView, OverWindowTransform, Result,
    SlidingWindowTransform, TableDescriptor, Transform,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Event-time bounds, start inclusive and end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// `None` when neither bound is set
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        if start.is_none() && end.is_none() {
            None
        } else {
            Some(Self { start, end })
        }
    }
}

/// Column computed by a row-level expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub expr: String,
    pub dtype: Option<DataType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Over,
    Sliding,
}

/// One unit of work in an [`ExecutionPlan`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    /// Read a source table
    Scan {
        table: String,
        system: String,
        format: Option<String>,
        properties: BTreeMap<String, String>,
        bounded: bool,
    },

    /// Add expression columns to `table`
    ///
    /// Columns of one step are computed side by side, so none of them reads
    /// another column of the same step.
    Derive {
        table: String,
        columns: Vec<DerivedColumn>,
    },

    /// Add a window aggregation column to `table`
    Window {
        table: String,
        feature: String,
        kind: WindowKind,
        expr: String,
        agg_func: AggFunc,
        group_by: Vec<String>,
        window_size_secs: Option<u64>,
        step_secs: Option<u64>,
        limit: Option<u64>,
        filter: Option<String>,
        dtype: Option<DataType>,
    },

    /// Look up `from_feature` in `from_table` by key and add it to `table`
    Join {
        table: String,
        feature: String,
        from_table: String,
        from_feature: String,
        keys: Vec<String>,
    },

    /// Keep rows whose timestamp lies in the range
    TimeRange {
        table: String,
        timestamp_field: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },

    /// Keep only the output columns of `table`
    Project { table: String, columns: Vec<String> },
}

impl PlanStep {
    /// Table this step produces or extends
    pub fn table(&self) -> &str {
        match self {
            Self::Scan { table, .. }
            | Self::Derive { table, .. }
            | Self::Window { table, .. }
            | Self::Join { table, .. }
            | Self::TimeRange { table, .. }
            | Self::Project { table, .. } => table,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::Derive { .. } => "derive",
            Self::Window { .. } => "window",
            Self::Join { .. } => "join",
            Self::TimeRange { .. } => "time_range",
            Self::Project { .. } => "project",
        }
    }
}

fn format_bound(bound: &Option<DateTime<Utc>>) -> String {
    bound.map_or_else(|| "..".to_string(), |t| t.to_rfc3339())
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan {
                table,
                system,
                bounded,
                ..
            } => {
                let mode = if *bounded { "bounded" } else { "unbounded" };
                write!(f, "scan {} from {} ({})", table, system, mode)
            }
            Self::Derive { table, columns } => {
                let columns: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = {}", c.name, c.expr))
                    .collect();
                write!(f, "derive {}: {}", table, columns.join(", "))
            }
            Self::Window {
                table,
                feature,
                kind,
                expr,
                agg_func,
                group_by,
                window_size_secs,
                ..
            } => {
                write!(f, "window {}.{} = {}({})", table, feature, agg_func, expr)?;
                if !group_by.is_empty() {
                    write!(f, " by {}", group_by.join(", "))?;
                }
                match (kind, window_size_secs) {
                    (_, Some(secs)) => write!(f, " over {}s", secs),
                    (WindowKind::Over, None) => write!(f, " over all rows"),
                    (WindowKind::Sliding, None) => Ok(()),
                }
            }
            Self::Join {
                table,
                feature,
                from_table,
                from_feature,
                keys,
            } => write!(
                f,
                "join {}.{} <- {}.{} on [{}]",
                table,
                feature,
                from_table,
                from_feature,
                keys.join(", ")
            ),
            Self::TimeRange {
                table,
                timestamp_field,
                start,
                end,
            } => write!(
                f,
                "filter {} where {} in [{}, {})",
                table,
                timestamp_field,
                format_bound(start),
                format_bound(end)
            ),
            Self::Project { table, columns } => {
                write!(f, "project {}: {}", table, columns.join(", "))
            }
        }
    }
}

/// Steps computing one table, and the columns it outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub table: String,
    pub bounded: bool,
    pub keys: Option<Vec<String>>,
    pub steps: Vec<PlanStep>,
    pub output_columns: Vec<String>,
}

impl ExecutionPlan {
    /// Plans `table`, which must be resolved
    ///
    /// `join_tables` holds every table referenced by a join anywhere in the
    /// chain, by registered name; see [`join_dependencies`].
    pub fn build(
        table: &TableDescriptor,
        join_tables: &HashMap<String, Arc<TableDescriptor>>,
        time_range: Option<TimeRange>,
    ) -> Result<Self> {
        if let TableDescriptor::Sink(sink) = table {
            return Err(Error::invalid_input(format!(
                "Cannot compute a table from sink {}",
                sink.describe()
            )));
        }

        let mut builder = PlanBuilder {
            join_tables,
            planned: HashSet::new(),
            steps: Vec::new(),
        };
        builder.plan_table(table)?;

        if let Some(range) = time_range {
            let timestamp_field = table.timestamp_field().ok_or_else(|| {
                Error::invalid_input(format!(
                    "Table '{}' has no timestamp field to filter by time range",
                    table.name()
                ))
            })?;
            builder.steps.push(PlanStep::TimeRange {
                table: table.name().to_string(),
                timestamp_field: timestamp_field.to_string(),
                start: range.start,
                end: range.end,
            });
        }

        let output_columns = table
            .get_output_features()?
            .into_iter()
            .map(|f| f.name)
            .collect();

        Ok(Self {
            table: table.name().to_string(),
            bounded: table.is_bounded()?,
            keys: table.keys().map(<[String]>::to_vec),
            steps: builder.steps,
            output_columns,
        })
    }
}

/// Names of the tables joined anywhere in the chain of `table`
pub fn join_dependencies(table: &TableDescriptor) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut current = table;
    while let TableDescriptor::FeatureView(view) = current {
        for feature in view.resolved_features()? {
            if let Transform::Join(join) = &feature.transform {
                if !names.contains(&join.table_name) {
                    names.push(join.table_name.clone());
                }
            }
        }
        current = view.resolved_source()?.as_ref();
    }
    Ok(names)
}

struct PlanBuilder<'a> {
    join_tables: &'a HashMap<String, Arc<TableDescriptor>>,
    planned: HashSet<String>,
    steps: Vec<PlanStep>,
}

impl PlanBuilder<'_> {
    fn plan_table(&mut self, table: &TableDescriptor) -> Result<()> {
        if !self.planned.insert(table.name().to_string()) {
            return Ok(());
        }
        match table {
            TableDescriptor::Source(source) => {
                self.steps.push(PlanStep::Scan {
                    table: source.name.clone(),
                    system: source.system_name.clone(),
                    format: source.data_format.clone(),
                    properties: source.properties.clone(),
                    bounded: source.bounded,
                });
                Ok(())
            }
            TableDescriptor::FeatureView(view) => self.plan_view(view),
            TableDescriptor::Sink(sink) => Err(Error::invalid_input(format!(
                "Cannot read from sink {}",
                sink.describe()
            ))),
        }
    }

    fn plan_view(&mut self, view: &FeatureView) -> Result<()> {
        self.plan_table(view.resolved_source()?)?;

        let join_tables = self.join_tables;
        let mut derived: Vec<DerivedColumn> = Vec::new();
        for feature in view.resolved_features()? {
            let step = match &feature.transform {
                Transform::Expression(t) => {
                    if !feature.is_pass_through() {
                        let inputs = expr::parse(&t.expr)
                            .map_err(|e| Error::expression(&feature.name, e))?
                            .variables();
                        if derived.iter().any(|c| inputs.contains(&c.name)) {
                            self.flush_derived(view.name(), &mut derived);
                        }
                        derived.push(DerivedColumn {
                            name: feature.name.clone(),
                            expr: t.expr.clone(),
                            dtype: feature.dtype.clone(),
                        });
                    }
                    continue;
                }
                Transform::OverWindow(t) => over_window_step(view.name(), feature, t),
                Transform::SlidingWindow(t) => sliding_window_step(view.name(), feature, t),
                Transform::Join(t) => {
                    let joined = join_tables
                        .get(&t.table_name)
                        .ok_or_else(|| Error::TableNotFound(t.table_name.clone()))?;
                    self.plan_table(joined)?;
                    PlanStep::Join {
                        table: view.name().to_string(),
                        feature: feature.name.clone(),
                        from_table: t.table_name.clone(),
                        from_feature: t.feature_name.clone(),
                        keys: feature.keys.clone().unwrap_or_default(),
                    }
                }
            };
            self.flush_derived(view.name(), &mut derived);
            self.steps.push(step);
        }
        self.flush_derived(view.name(), &mut derived);

        let columns = view
            .get_output_features()?
            .into_iter()
            .map(|f| f.name)
            .collect();
        self.steps.push(PlanStep::Project {
            table: view.name().to_string(),
            columns,
        });
        Ok(())
    }

    fn flush_derived(&mut self, table: &str, derived: &mut Vec<DerivedColumn>) {
        if !derived.is_empty() {
            self.steps.push(PlanStep::Derive {
                table: table.to_string(),
                columns: std::mem::take(derived),
            });
        }
    }
}

fn over_window_step(table: &str, feature: &Feature, t: &OverWindowTransform) -> PlanStep {
    PlanStep::Window {
        table: table.to_string(),
        feature: feature.name.clone(),
        kind: WindowKind::Over,
        expr: t.expr.clone(),
        agg_func: t.agg_func,
        group_by: t.group_by_keys.clone(),
        window_size_secs: t.window_size.map(|d| d.as_secs()),
        step_secs: None,
        limit: t.limit,
        filter: t.filter_expr.clone(),
        dtype: feature.dtype.clone(),
    }
}

fn sliding_window_step(table: &str, feature: &Feature, t: &SlidingWindowTransform) -> PlanStep {
    PlanStep::Window {
        table: table.to_string(),
        feature: feature.name.clone(),
        kind: WindowKind::Sliding,
        expr: t.expr.clone(),
        agg_func: t.agg_func,
        group_by: t.group_by_keys.clone(),
        window_size_secs: Some(t.window_size.as_secs()),
        step_secs: Some(t.step_size.as_secs()),
        limit: t.limit,
        filter: t.filter_expr.clone(),
        dtype: feature.dtype.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureplan_core::{PrintSink, Schema, Sink, Source};
    use std::time::Duration;

    fn orders() -> Source {
        Source::file_system(
            "orders",
            "/data/orders",
            "parquet",
            Schema::builder()
                .column("user_id", DataType::Int64)
                .column("item_id", DataType::Int64)
                .column("price", DataType::Float64)
                .column("ts", DataType::Timestamp)
                .build(),
        )
        .with_keys(&["user_id"])
        .with_timestamp("ts", "epoch")
    }

    fn items() -> Source {
        Source::file_system(
            "items",
            "/data/items",
            "parquet",
            Schema::builder()
                .column("item_id", DataType::Int64)
                .column("category", DataType::String)
                .build(),
        )
        .with_keys(&["item_id"])
    }

    fn step_names(plan: &ExecutionPlan) -> Vec<&'static str> {
        plan.steps.iter().map(PlanStep::name).collect()
    }

    #[test]
    fn test_plan_source() {
        let table = TableDescriptor::from(orders());
        let plan = ExecutionPlan::build(&table, &HashMap::new(), None).unwrap();

        assert_eq!(step_names(&plan), vec!["scan"]);
        assert_eq!(plan.output_columns, vec!["user_id", "item_id", "price", "ts"]);
        assert!(plan.bounded);
        assert_eq!(plan.keys, Some(vec!["user_id".to_string()]));
    }

    #[test]
    fn test_plan_groups_consecutive_expressions() {
        let view = FeatureView::builder("order_features")
            .source(orders())
            .feature(Feature::expression("price_cents", "price * 100"))
            .feature(Feature::expression("discounted", "price * 0.9"))
            .feature(Feature::new(
                "spend_1d",
                OverWindowTransform::new("price", AggFunc::Sum)
                    .group_by(&["user_id"])
                    .window_size(Duration::from_secs(86400)),
            ))
            .feature(Feature::expression("user_id", "user_id"))
            .feature(Feature::expression("double_spend", "spend_1d * 2"))
            .build()
            .unwrap();

        let plan =
            ExecutionPlan::build(&TableDescriptor::from(view), &HashMap::new(), None).unwrap();

        assert_eq!(
            step_names(&plan),
            vec!["scan", "derive", "window", "derive", "project"]
        );
        match &plan.steps[1] {
            PlanStep::Derive { columns, .. } => {
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].dtype, Some(DataType::Float64));
            }
            other => panic!("Expected derive step, got {:?}", other),
        }
        match &plan.steps[2] {
            PlanStep::Window {
                window_size_secs,
                step_secs,
                kind,
                ..
            } => {
                assert_eq!(*window_size_secs, Some(86400));
                assert_eq!(*step_secs, None);
                assert_eq!(*kind, WindowKind::Over);
            }
            other => panic!("Expected window step, got {:?}", other),
        }
        // the pass-through `user_id` adds no derive column
        match &plan.steps[3] {
            PlanStep::Derive { columns, .. } => assert_eq!(columns[0].name, "double_spend"),
            other => panic!("Expected derive step, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_splits_derive_on_column_dependency() {
        let view = FeatureView::builder("order_features")
            .source(orders())
            .feature(Feature::expression("price_cents", "price * 100"))
            .feature(Feature::expression("discounted", "price * 0.9"))
            .feature(Feature::expression("discounted_cents", "discounted * 100"))
            .feature(Feature::expression("is_large", "price > 1000"))
            .build()
            .unwrap();

        let plan =
            ExecutionPlan::build(&TableDescriptor::from(view), &HashMap::new(), None).unwrap();

        assert_eq!(step_names(&plan), vec!["scan", "derive", "derive", "project"]);
        let names = |step: &PlanStep| -> Vec<String> {
            match step {
                PlanStep::Derive { columns, .. } => columns.iter().map(|c| c.name.clone()).collect(),
                other => panic!("Expected derive step, got {:?}", other),
            }
        };
        assert_eq!(names(&plan.steps[1]), vec!["price_cents", "discounted"]);
        assert_eq!(names(&plan.steps[2]), vec!["discounted_cents", "is_large"]);
    }

    #[test]
    fn test_plan_join_plans_joined_table_once() {
        let items = Arc::new(TableDescriptor::from(items()));
        let join = |name: &str| {
            Feature::new(name, Transform::join("items", "category"))
                .with_keys(&["item_id"])
                .with_dtype(DataType::String)
        };
        let view = FeatureView::builder("enriched")
            .source(orders())
            .feature(join("category"))
            .feature(join("category_again"))
            .build()
            .unwrap();
        let join_tables = HashMap::from([("items".to_string(), items)]);

        let table = TableDescriptor::from(view);
        assert_eq!(join_dependencies(&table).unwrap(), vec!["items"]);

        let plan = ExecutionPlan::build(&table, &join_tables, None).unwrap();
        assert_eq!(
            step_names(&plan),
            vec!["scan", "scan", "join", "join", "project"]
        );
        assert_eq!(plan.steps[1].table(), "items");
        assert_eq!(
            plan.steps[2].to_string(),
            "join enriched.category <- items.category on [item_id]"
        );
    }

    #[test]
    fn test_plan_missing_join_table() {
        let view = FeatureView::builder("enriched")
            .source(orders())
            .feature(
                Feature::new("category", Transform::join("items", "category"))
                    .with_dtype(DataType::String),
            )
            .build()
            .unwrap();

        let err = ExecutionPlan::build(&TableDescriptor::from(view), &HashMap::new(), None)
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(ref name) if name == "items"));
    }

    #[test]
    fn test_plan_time_range_requires_timestamp() {
        let range = TimeRange::new(DateTime::from_timestamp(0, 0), None);

        let plan =
            ExecutionPlan::build(&TableDescriptor::from(orders()), &HashMap::new(), range)
                .unwrap();
        assert_eq!(step_names(&plan), vec!["scan", "time_range"]);

        let err = ExecutionPlan::build(&TableDescriptor::from(items()), &HashMap::new(), range)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_plan_rejects_sink() {
        let table = TableDescriptor::from(Sink::from(PrintSink {}));
        let err = ExecutionPlan::build(&table, &HashMap::new(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_plan_step_serialization() {
        let step = PlanStep::Project {
            table: "v".to_string(),
            columns: vec!["a".to_string()],
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], "project");
        assert_eq!(json["columns"][0], "a");
    }
}
