//! Numeric and temporal comparison conditions
//!
//! A comparison body names the value under test and exactly one operator:
//! `{"value": ..., "isGreaterThan": ...}`. Temporal values are UTC. In a
//! `dateTimeCondition`, an operand that is a plain date stands for the
//! whole day `[midnight, next midnight)`.

use std::cmp::Ordering;

use ae_core::single_discriminator;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};
use crate::parse::{as_object, optional_bool, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

// ==================== Numeric ====================

pub const NUMERIC_OPERATORS: &[&str] = &[
    "isEqualTo",
    "isNotEqualTo",
    "isLessThan",
    "isLessThanOrEqualTo",
    "isGreaterThan",
    "isGreaterThanOrEqualTo",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOperator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl NumericOperator {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "isEqualTo" => NumericOperator::EqualTo,
            "isNotEqualTo" => NumericOperator::NotEqualTo,
            "isLessThan" => NumericOperator::LessThan,
            "isLessThanOrEqualTo" => NumericOperator::LessThanOrEqualTo,
            "isGreaterThan" => NumericOperator::GreaterThan,
            "isGreaterThanOrEqualTo" => NumericOperator::GreaterThanOrEqualTo,
            _ => return None,
        })
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            NumericOperator::EqualTo => ordering == Ordering::Equal,
            NumericOperator::NotEqualTo => ordering != Ordering::Equal,
            NumericOperator::LessThan => ordering == Ordering::Less,
            NumericOperator::LessThanOrEqualTo => ordering != Ordering::Greater,
            NumericOperator::GreaterThan => ordering == Ordering::Greater,
            NumericOperator::GreaterThanOrEqualTo => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Number,
}

/// Parsed `integerCondition` / `numberCondition`
#[derive(Debug, Clone)]
pub struct NumericConditionBuilder {
    pub kind: NumericKind,
    pub value: Box<ProviderBuilder>,
    pub operator: NumericOperator,
    pub operand: Box<ProviderBuilder>,
}

impl NumericConditionBuilder {
    pub fn parse(kind: NumericKind, body: &Value) -> BuildResult<Self> {
        let node_kind = match kind {
            NumericKind::Integer => "integerCondition",
            NumericKind::Number => "numberCondition",
        };
        let object = as_object(body, node_kind)?;
        let node = single_discriminator(object, NUMERIC_OPERATORS, node_kind)?;
        let operator = NumericOperator::from_key(node.key)
            .ok_or_else(|| crate::parse::malformed(node_kind, "Unknown operator."))?;
        Ok(Self {
            kind,
            value: Box::new(ProviderBuilder::parse_required(object, "value", node_kind)?),
            operator,
            operand: Box::new(ProviderBuilder::parse(node.body)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NumericCondition {
    pub(crate) kind: NumericKind,
    pub(crate) value: BoxedProvider,
    pub(crate) operator: NumericOperator,
    pub(crate) operand: BoxedProvider,
}

#[async_trait]
impl Provider for NumericCondition {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let ordering = match self.kind {
            NumericKind::Integer => {
                let value = ctx.resolve_i64(self.value.as_ref()).await?;
                let operand = ctx.resolve_i64(self.operand.as_ref()).await?;
                value.cmp(&operand)
            }
            NumericKind::Number => {
                let value = ctx.resolve_f64(self.value.as_ref()).await?;
                let operand = ctx.resolve_f64(self.operand.as_ref()).await?;
                // NaN cannot come out of JSON
                value.partial_cmp(&operand).unwrap_or(Ordering::Equal)
            }
        };
        Ok(Value::Bool(self.operator.holds(ordering)))
    }
}

// ==================== Temporal ====================

pub const TEMPORAL_OPERATORS: &[&str] = &[
    "isBefore",
    "isAfter",
    "isEqualTo",
    "isBeforeOrEqualTo",
    "isAfterOrEqualTo",
    "isInPeriod",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

impl TemporalKind {
    fn node_kind(&self) -> &'static str {
        match self {
            TemporalKind::Date => "dateCondition",
            TemporalKind::Time => "timeCondition",
            TemporalKind::DateTime => "dateTimeCondition",
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            TemporalKind::Date => "date",
            TemporalKind::Time => "time",
            TemporalKind::DateTime => "dateTime",
        }
    }
}

/// Temporal operator with its operands
#[derive(Debug, Clone)]
pub enum TemporalOperatorBuilder {
    Before(Box<ProviderBuilder>),
    After(Box<ProviderBuilder>),
    EqualTo(Box<ProviderBuilder>),
    BeforeOrEqualTo(Box<ProviderBuilder>),
    AfterOrEqualTo(Box<ProviderBuilder>),
    InPeriod {
        from: Box<ProviderBuilder>,
        to: Box<ProviderBuilder>,
        from_inclusive: bool,
        to_inclusive: bool,
    },
}

/// Parsed `dateCondition` / `timeCondition` / `dateTimeCondition`
#[derive(Debug, Clone)]
pub struct TemporalConditionBuilder {
    pub kind: TemporalKind,
    pub value: Box<ProviderBuilder>,
    pub operator: TemporalOperatorBuilder,
}

impl TemporalConditionBuilder {
    pub fn parse(kind: TemporalKind, body: &Value) -> BuildResult<Self> {
        let node_kind = kind.node_kind();
        let object = as_object(body, node_kind)?;
        let node = single_discriminator(object, TEMPORAL_OPERATORS, node_kind)?;
        let operand = || ProviderBuilder::parse(node.body).map(Box::new);
        let operator = match node.key {
            "isBefore" => TemporalOperatorBuilder::Before(operand()?),
            "isAfter" => TemporalOperatorBuilder::After(operand()?),
            "isEqualTo" => TemporalOperatorBuilder::EqualTo(operand()?),
            "isBeforeOrEqualTo" => TemporalOperatorBuilder::BeforeOrEqualTo(operand()?),
            "isAfterOrEqualTo" => TemporalOperatorBuilder::AfterOrEqualTo(operand()?),
            _ => {
                const PERIOD: &str = "isInPeriod operator";
                let period = as_object(node.body, PERIOD)?;
                TemporalOperatorBuilder::InPeriod {
                    from: Box::new(ProviderBuilder::parse_required(period, "from", PERIOD)?),
                    to: Box::new(ProviderBuilder::parse_required(period, "to", PERIOD)?),
                    from_inclusive: optional_bool(period, "fromInclusive", true, PERIOD)?,
                    to_inclusive: optional_bool(period, "toInclusive", false, PERIOD)?,
                }
            }
        };
        Ok(Self {
            kind,
            value: Box::new(ProviderBuilder::parse_required(object, "value", node_kind)?),
            operator,
        })
    }
}

#[derive(Debug, Clone)]
pub enum TemporalOperator {
    Before(BoxedProvider),
    After(BoxedProvider),
    EqualTo(BoxedProvider),
    BeforeOrEqualTo(BoxedProvider),
    AfterOrEqualTo(BoxedProvider),
    InPeriod {
        from: BoxedProvider,
        to: BoxedProvider,
        from_inclusive: bool,
        to_inclusive: bool,
    },
}

#[derive(Debug, Clone)]
pub struct TemporalCondition {
    pub(crate) kind: TemporalKind,
    pub(crate) value: BoxedProvider,
    pub(crate) operator: TemporalOperator,
}

/// A point in time, or a half-open span `[start, end)` for whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Moment<T> {
    start: T,
    end: Option<T>,
}

impl<T: Ord + Copy> Moment<T> {
    fn point(at: T) -> Self {
        Self {
            start: at,
            end: None,
        }
    }

    fn contains(&self, at: T) -> bool {
        match self.end {
            Some(end) => self.start <= at && at < end,
            None => self.start == at,
        }
    }

    fn equal(&self, other: &Self) -> bool {
        match (self.end, other.end) {
            (None, _) => other.contains(self.start),
            (Some(_), None) => self.contains(other.start),
            (Some(a), Some(b)) => self.start == other.start && a == b,
        }
    }

    /// Entirely before `other` begins
    fn before(&self, other: &Self) -> bool {
        match self.end {
            Some(end) => end <= other.start,
            None => self.start < other.start,
        }
    }

    /// Begins after `other` has ended
    fn after(&self, other: &Self) -> bool {
        match other.end {
            Some(end) => self.start >= end,
            None => self.start > other.start,
        }
    }

    fn in_period(&self, from: &Self, to: &Self, from_inclusive: bool, to_inclusive: bool) -> bool {
        let lower = if from_inclusive {
            self.start >= from.start
        } else {
            self.after(from)
        };
        let upper = if to_inclusive {
            match to.end {
                Some(end) => self.start < end,
                None => self.start <= to.start,
            }
        } else {
            self.start < to.start
        };
        lower && upper
    }
}

/// `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`
pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn date_moment(text: &str) -> Option<Moment<NaiveDate>> {
    parse_date(text).map(Moment::point)
}

fn time_moment(text: &str) -> Option<Moment<NaiveTime>> {
    parse_time(text).map(Moment::point)
}

fn parse_date_time(text: &str) -> Option<Moment<DateTime<Utc>>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(Moment::point(at.with_timezone(&Utc)));
    }
    let day = parse_date(text)?;
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = day
        .checked_add_days(Days::new(1))?
        .and_time(NaiveTime::MIN)
        .and_utc();
    Some(Moment {
        start,
        end: Some(end),
    })
}

impl TemporalCondition {
    async fn moment<T>(
        &self,
        ctx: &mut ProviderContext<'_>,
        provider: &BoxedProvider,
        parse: fn(&str) -> Option<Moment<T>>,
    ) -> ProviderResult<Moment<T>> {
        let value = ctx.resolve(provider.as_ref()).await?;
        let moment = match &value {
            Value::String(text) => parse(text),
            _ => None,
        };
        moment.ok_or_else(|| ProviderError::invalid_type("value", self.kind.type_name(), &value))
    }

    async fn evaluate<T: Ord + Copy + Send>(
        &self,
        ctx: &mut ProviderContext<'_>,
        parse: fn(&str) -> Option<Moment<T>>,
    ) -> ProviderResult<bool> {
        let value = self.moment(ctx, &self.value, parse).await?;
        Ok(match &self.operator {
            TemporalOperator::Before(p) => value.before(&self.moment(ctx, p, parse).await?),
            TemporalOperator::After(p) => value.after(&self.moment(ctx, p, parse).await?),
            TemporalOperator::EqualTo(p) => value.equal(&self.moment(ctx, p, parse).await?),
            TemporalOperator::BeforeOrEqualTo(p) => {
                let other = self.moment(ctx, p, parse).await?;
                value.before(&other) || value.equal(&other)
            }
            TemporalOperator::AfterOrEqualTo(p) => {
                let other = self.moment(ctx, p, parse).await?;
                value.after(&other) || value.equal(&other)
            }
            TemporalOperator::InPeriod {
                from,
                to,
                from_inclusive,
                to_inclusive,
            } => {
                let from = self.moment(ctx, from, parse).await?;
                let to = self.moment(ctx, to, parse).await?;
                value.in_period(&from, &to, *from_inclusive, *to_inclusive)
            }
        })
    }
}

#[async_trait]
impl Provider for TemporalCondition {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let result = match self.kind {
            TemporalKind::Date => self.evaluate(ctx, date_moment).await?,
            TemporalKind::Time => self.evaluate(ctx, time_moment).await?,
            TemporalKind::DateTime => self.evaluate(ctx, parse_date_time).await?,
        };
        Ok(Value::Bool(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_data;
    use ae_core::codes;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    async fn eval(condition: Value) -> ProviderResult<Value> {
        let provider = ProviderBuilder::parse(&condition)
            .unwrap()
            .build(&Default::default());
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        ctx.resolve(provider.as_ref()).await
    }

    // ==================== Numeric ====================

    #[tokio::test]
    async fn test_integer_operators() {
        let cases = [
            ("isEqualTo", 3, true),
            ("isNotEqualTo", 3, false),
            ("isLessThan", 4, true),
            ("isLessThanOrEqualTo", 3, true),
            ("isGreaterThan", 3, false),
            ("isGreaterThanOrEqualTo", 2, true),
        ];
        for (operator, operand, expected) in cases {
            let condition = json!({"integerCondition": {"value": 3, operator: operand}});
            assert_eq!(eval(condition).await.unwrap(), json!(expected), "{}", operator);
        }
    }

    #[tokio::test]
    async fn test_number_condition_rejects_text() {
        let err = eval(json!({"numberCondition": {"value": "3", "isLessThan": 4}}))
            .await
            .unwrap_err();
        assert_eq!(err.error_data().code, codes::INVALID_TYPE);
    }

    #[test]
    fn test_comparison_needs_exactly_one_operator() {
        let err = ProviderBuilder::parse(
            &json!({"integerCondition": {"value": 1, "isLessThan": 2, "isGreaterThan": 0}}),
        )
        .unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);

        let err =
            ProviderBuilder::parse(&json!({"integerCondition": {"value": 1}})).unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
    }

    // ==================== Temporal ====================

    #[tokio::test]
    async fn test_date_condition() {
        let before = json!({"dateCondition": {"value": "2026-01-01", "isBefore": "2026-01-02"}});
        assert_eq!(eval(before).await.unwrap(), json!(true));

        let bad = json!({"dateCondition": {"value": "01/01/2026", "isBefore": "2026-01-02"}});
        assert_eq!(eval(bad).await.unwrap_err().error_data().code, codes::INVALID_TYPE);
    }

    #[tokio::test]
    async fn test_date_time_equal_to_date_spans_the_day() {
        let at = |value: &str| {
            json!({"dateTimeCondition": {"value": value, "isEqualTo": "2026-03-10"}})
        };
        assert_eq!(eval(at("2026-03-10T00:00:00Z")).await.unwrap(), json!(true));
        assert_eq!(eval(at("2026-03-10T23:59:59.999Z")).await.unwrap(), json!(true));
        assert_eq!(eval(at("2026-03-11T00:00:00Z")).await.unwrap(), json!(false));
        assert_eq!(eval(at("2026-03-10T10:00:00+11:00")).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_date_time_before_and_after_a_day() {
        let before = json!({"dateTimeCondition": {
            "value": "2026-03-09T23:59:59Z", "isBefore": "2026-03-10"
        }});
        assert_eq!(eval(before).await.unwrap(), json!(true));

        let after = json!({"dateTimeCondition": {
            "value": "2026-03-10T12:00:00Z", "isAfter": "2026-03-10"
        }});
        assert_eq!(eval(after).await.unwrap(), json!(false));

        let after_or_equal = json!({"dateTimeCondition": {
            "value": "2026-03-10T12:00:00Z", "isAfterOrEqualTo": "2026-03-10"
        }});
        assert_eq!(eval(after_or_equal).await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_in_period_boundaries() {
        let period = |value: &str, to_inclusive: bool| {
            json!({"timeCondition": {"value": value, "isInPeriod": {
                "from": "09:00", "to": "17:00", "toInclusive": to_inclusive
            }}})
        };
        assert_eq!(eval(period("09:00:00", false)).await.unwrap(), json!(true));
        assert_eq!(eval(period("17:00", false)).await.unwrap(), json!(false));
        assert_eq!(eval(period("17:00", true)).await.unwrap(), json!(true));
        assert_eq!(eval(period("08:59:59", true)).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_in_period_with_day_bounds() {
        let condition = json!({"dateTimeCondition": {
            "value": "2026-03-31T18:00:00Z",
            "isInPeriod": {"from": "2026-03-01", "to": "2026-03-31", "toInclusive": true}
        }});
        assert_eq!(eval(condition).await.unwrap(), json!(true));

        let condition = json!({"dateTimeCondition": {
            "value": "2026-03-31T18:00:00Z",
            "isInPeriod": {"from": "2026-03-01", "to": "2026-03-31"}
        }});
        assert_eq!(eval(condition).await.unwrap(), json!(false));
    }
}
