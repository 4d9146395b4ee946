//! Expression, filter and ordering IR shared by gateway requests and backend queries.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Aggregation and scalar functions understood by the backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionType {
    #[serde(rename = "COUNT")]
    Count,
    #[serde(rename = "DISTINCTCOUNT")]
    DistinctCount,
    #[serde(rename = "SUM")]
    Sum,
    #[serde(rename = "MIN")]
    Min,
    #[serde(rename = "MAX")]
    Max,
    #[serde(rename = "AVG")]
    Avg,
    /// Average rate per second over the query window.
    #[serde(rename = "AVGRATE")]
    AvgRate,
    #[serde(rename = "PERCENTILE")]
    Percentile,
    /// Time bucketing: `(timestamp, inputUnit, outputUnit, bucketDuration)`.
    #[serde(rename = "dateTimeConvert")]
    DateTimeConvert,
    /// Any other backend function, passed through by name.
    Custom(String),
}

impl FunctionType {
    /// The function name as sent to backends.
    pub fn name(&self) -> &str {
        match self {
            FunctionType::Count => "COUNT",
            FunctionType::DistinctCount => "DISTINCTCOUNT",
            FunctionType::Sum => "SUM",
            FunctionType::Min => "MIN",
            FunctionType::Max => "MAX",
            FunctionType::Avg => "AVG",
            FunctionType::AvgRate => "AVGRATE",
            FunctionType::Percentile => "PERCENTILE",
            FunctionType::DateTimeConvert => "dateTimeConvert",
            FunctionType::Custom(name) => name,
        }
    }

    /// Whether this is an aggregation (as opposed to a scalar transform).
    pub fn is_aggregation(&self) -> bool {
        !matches!(self, FunctionType::DateTimeConvert | FunctionType::Custom(_))
    }
}

/// Reference to a catalog attribute, e.g. `API.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// Fully qualified attribute id.
    pub id: String,
    /// Output name; defaults to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A function applied to argument expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    pub function: FunctionType,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl FunctionExpression {
    /// `<FUNCTION_NAME>_<firstArgumentAttributeId>`, or the bare function name
    /// when no argument references an attribute.
    pub fn default_alias(&self) -> String {
        match self.arguments.iter().find_map(Expression::first_attribute_id) {
            Some(id) => format!("{}_{}", self.function.name(), id),
            None => self.function.name().to_string(),
        }
    }

    /// The declared alias or the default one.
    pub fn result_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.default_alias())
    }

    /// Number of `Health` marker arguments.
    pub fn health_argument_count(&self) -> usize {
        self.arguments
            .iter()
            .filter(|arg| matches!(arg, Expression::Health))
            .count()
    }
}

/// A selectable or filterable expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Attribute(AttributeRef),
    Literal(Value),
    Function(FunctionExpression),
    /// Marker argument requesting a health score for the enclosing function.
    Health,
}

impl Expression {
    /// Reference an attribute by id.
    pub fn attribute(id: impl Into<String>) -> Self {
        Expression::Attribute(AttributeRef {
            id: id.into(),
            alias: None,
        })
    }

    /// A literal value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Apply `function` to `arguments`.
    pub fn function(function: FunctionType, arguments: Vec<Expression>) -> Self {
        Expression::Function(FunctionExpression {
            function,
            arguments,
            alias: None,
        })
    }

    /// Shorthand for a single-attribute aggregation, e.g. `SUM(API.calls)`.
    pub fn aggregate(function: FunctionType, attribute_id: impl Into<String>) -> Self {
        Self::function(function, vec![Self::attribute(attribute_id)])
    }

    /// Set the alias. Literals and health markers have no alias and are
    /// returned unchanged.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        match &mut self {
            Expression::Attribute(attr) => attr.alias = Some(alias.into()),
            Expression::Function(func) => func.alias = Some(alias.into()),
            Expression::Literal(_) | Expression::Health => {}
        }
        self
    }

    /// The explicitly declared alias, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Expression::Attribute(attr) => attr.alias.as_deref(),
            Expression::Function(func) => func.alias.as_deref(),
            Expression::Literal(_) | Expression::Health => None,
        }
    }

    /// The name this expression's value is reported under: the alias, else
    /// the attribute id, else the function's default alias.
    pub fn result_name(&self) -> String {
        match self {
            Expression::Attribute(attr) => attr.alias.clone().unwrap_or_else(|| attr.id.clone()),
            Expression::Function(func) => func.result_name(),
            Expression::Literal(value) => value.to_string(),
            Expression::Health => "health".to_string(),
        }
    }

    /// The attribute id if this is a plain attribute reference.
    pub fn attribute_id(&self) -> Option<&str> {
        match self {
            Expression::Attribute(attr) => Some(&attr.id),
            _ => None,
        }
    }

    /// The literal value if this is a literal.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expression::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// The function if this is a function expression.
    pub fn as_function(&self) -> Option<&FunctionExpression> {
        match self {
            Expression::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Whether this is a function expression.
    pub fn is_function(&self) -> bool {
        matches!(self, Expression::Function(_))
    }

    /// All attribute ids referenced anywhere inside, first occurrence order.
    pub fn attribute_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_attribute_ids(&mut ids);
        ids
    }

    pub(crate) fn collect_attribute_ids(&self, ids: &mut Vec<String>) {
        match self {
            Expression::Attribute(attr) => {
                if !ids.contains(&attr.id) {
                    ids.push(attr.id.clone());
                }
            }
            Expression::Function(func) => {
                for arg in &func.arguments {
                    arg.collect_attribute_ids(ids);
                }
            }
            Expression::Literal(_) | Expression::Health => {}
        }
    }

    fn first_attribute_id(&self) -> Option<&str> {
        match self {
            Expression::Attribute(attr) => Some(&attr.id),
            Expression::Function(func) => func.arguments.iter().find_map(Expression::first_attribute_id),
            Expression::Literal(_) | Expression::Health => None,
        }
    }
}

/// Comparison operators for predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Neq,
    In,
    NotIn,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    ContainsKey,
    ContainsKeyvalue,
}

/// Logical combinators for composite filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// `lhs <operator> rhs`.
    Predicate {
        lhs: Expression,
        operator: Operator,
        rhs: Expression,
    },
    /// Logical combination of child filters.
    Composite {
        operator: LogicalOperator,
        children: Vec<Filter>,
    },
}

impl Filter {
    /// Create a predicate.
    pub fn predicate(lhs: Expression, operator: Operator, rhs: Expression) -> Self {
        Filter::Predicate { lhs, operator, rhs }
    }

    /// `attribute <operator> literal`.
    pub fn compare(attribute_id: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::predicate(
            Expression::attribute(attribute_id),
            operator,
            Expression::literal(value),
        )
    }

    /// `attribute == literal`.
    pub fn eq(attribute_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute_id, Operator::Eq, value)
    }

    /// `attribute != literal`.
    pub fn neq(attribute_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute_id, Operator::Neq, value)
    }

    /// `attribute IN (values)`.
    pub fn in_list(attribute_id: impl Into<String>, values: Vec<String>) -> Self {
        Self::compare(attribute_id, Operator::In, Value::StringArray(values))
    }

    /// AND of the children.
    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Composite {
            operator: LogicalOperator::And,
            children,
        }
    }

    /// OR of the children.
    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Composite {
            operator: LogicalOperator::Or,
            children,
        }
    }

    /// Negation of `child`.
    pub fn not(child: Filter) -> Self {
        Filter::Composite {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    /// AND the filters together. A single filter is returned as is.
    pub fn and_all(mut filters: Vec<Filter>) -> Option<Self> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Self::and(filters)),
        }
    }

    /// Whether this node is a composite with the given operator.
    pub fn is_composite(&self, op: LogicalOperator) -> bool {
        matches!(self, Filter::Composite { operator, .. } if *operator == op)
    }

    /// Whether an OR or NOT node appears anywhere in the tree.
    pub fn contains_disjunction_or_negation(&self) -> bool {
        match self {
            Filter::Predicate { .. } => false,
            Filter::Composite { operator, children } => {
                *operator != LogicalOperator::And
                    || children.iter().any(Filter::contains_disjunction_or_negation)
            }
        }
    }

    /// Left-hand expressions of every predicate, depth first.
    pub fn lhs_expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        self.collect_lhs(&mut out);
        out
    }

    fn collect_lhs<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        match self {
            Filter::Predicate { lhs, .. } => out.push(lhs),
            Filter::Composite { children, .. } => {
                for child in children {
                    child.collect_lhs(out);
                }
            }
        }
    }

    /// Attribute ids referenced on either side of any predicate.
    pub fn attribute_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_attribute_ids(&mut ids);
        ids
    }

    fn collect_attribute_ids(&self, ids: &mut Vec<String>) {
        match self {
            Filter::Predicate { lhs, rhs, .. } => {
                lhs.collect_attribute_ids(ids);
                rhs.collect_attribute_ids(ids);
            }
            Filter::Composite { children, .. } => {
                for child in children {
                    child.collect_attribute_ids(ids);
                }
            }
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// An ordering over an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpression {
    pub expression: Expression,
    #[serde(default)]
    pub order: SortOrder,
}

impl OrderByExpression {
    /// Ascending order.
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Asc,
        }
    }

    /// Descending order.
    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Desc,
        }
    }
}
