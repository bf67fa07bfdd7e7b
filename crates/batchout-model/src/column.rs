use crate::error::ModelError;
use crate::processor::{apply_chain, build_chain, Processor};
use crate::value::{scalar_is_truthy, scalar_to_string, Bindings, ColumnValue};
use batchout_config::{ConfigError, Fragment, Registry};
use batchout_extract::{Extractor, ExtractResult};
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use std::str::FromStr;
use std::sync::OnceLock;

/// Casts a processed scalar value to the column's typed output. Cast
/// failures are logged and yield `None`; they never abort the run.
pub trait Column: Send + Sync {
    fn extractor_name(&self) -> &str;
    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue>;
}

struct ScalarColumnConfig {
    path: String,
    extractor_name: String,
    processors: Vec<Box<dyn Processor>>,
}

impl ScalarColumnConfig {
    fn from_fragment(fragment: &Fragment) -> Result<Self, ConfigError> {
        let path = fragment.required("path")?;
        let extractor_name = fragment.required("extractor")?;
        let processor_values: Vec<Value> = fragment.with_default("processors", Vec::new())?;
        let processor_fragments: Vec<Fragment> = processor_values
            .into_iter()
            .map(Fragment::from_value)
            .collect::<Result<_, _>>()?;
        let processors = build_chain(&processor_fragments)?;
        Ok(ScalarColumnConfig { path, extractor_name, processors })
    }

    /// Extracts, runs the processor chain, and hands back the value ready
    /// for a cast — or `None` if extraction found nothing.
    fn processed(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<Value> {
        let formatted = bindings.format(&self.path);
        let extracted = match extractor.extract(&formatted, payload) {
            ExtractResult::One(_, v) => v,
            ExtractResult::All(_, values) => Some(Value::Array(values)),
        }?;
        if extracted.is_null() {
            return None;
        }
        Some(apply_chain(&self.processors, extracted))
    }
}

fn log_cast_failure(path: &str, value: &Value, kind: &str, err: impl std::fmt::Display) {
    tracing::warn!(%path, value = %value, kind, %err, "failed to cast extracted value");
}

pub struct StringColumn(ScalarColumnConfig);

impl StringColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(StringColumn(ScalarColumnConfig::from_fragment(fragment)?)))
    }
}

impl Column for StringColumn {
    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.processed(extractor, payload, bindings)?;
        Some(ColumnValue::String(scalar_to_string(&v)))
    }
}

pub struct IntegerColumn(ScalarColumnConfig);

impl IntegerColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(IntegerColumn(ScalarColumnConfig::from_fragment(fragment)?)))
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Bool(b) => Some(*b as i64),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}

impl Column for IntegerColumn {
    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.processed(extractor, payload, bindings)?;
        match as_i64(&v) {
            Some(i) => Some(ColumnValue::Integer(i)),
            None => {
                log_cast_failure(&self.0.path, &v, "integer", "value does not parse as an integer");
                None
            }
        }
    }
}

pub struct FloatColumn(ScalarColumnConfig);

impl FloatColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(FloatColumn(ScalarColumnConfig::from_fragment(fragment)?)))
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl Column for FloatColumn {
    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.processed(extractor, payload, bindings)?;
        match as_f64(&v) {
            Some(f) => Some(ColumnValue::Float(f)),
            None => {
                log_cast_failure(&self.0.path, &v, "float", "value does not parse as a float");
                None
            }
        }
    }
}

pub struct BooleanColumn(ScalarColumnConfig);

impl BooleanColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(BooleanColumn(ScalarColumnConfig::from_fragment(fragment)?)))
    }
}

impl Column for BooleanColumn {
    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.processed(extractor, payload, bindings)?;
        Some(ColumnValue::Boolean(scalar_is_truthy(&v)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateParser {
    Iso,
    Unix,
    Custom,
}

struct TemporalConfig {
    scalar: ScalarColumnConfig,
    timezone: Tz,
    parser: DateParser,
    format: Option<String>,
}

impl TemporalConfig {
    fn from_fragment(fragment: &Fragment) -> Result<Self, ConfigError> {
        let scalar = ScalarColumnConfig::from_fragment(fragment)?;
        let timezone_name: String = fragment.with_default("timezone", "UTC".to_string())?;
        let timezone = Tz::from_str(&timezone_name)
            .map_err(|_| ConfigError::invalid("timezone", ModelError::InvalidTimezone(timezone_name).to_string()))?;
        let parser_name = fragment.choice("parser", &["iso", "unix", "custom"], Some("iso"))?;
        let parser = match parser_name.as_str() {
            "iso" => DateParser::Iso,
            "unix" => DateParser::Unix,
            _ => DateParser::Custom,
        };
        let format: Option<String> = fragment.optional("format")?;
        if parser == DateParser::Custom {
            let fmt = format.as_deref().ok_or_else(|| ConfigError::invalid("format", ModelError::CustomFormatRequired.to_string()))?;
            // validate the format string is usable by formatting "now" with it.
            let probe = chrono::Utc::now().with_timezone(&timezone).format(fmt);
            if probe.to_string().contains('\u{fffd}') {
                return Err(ConfigError::invalid(
                    "format",
                    ModelError::InvalidFormat { format: fmt.to_string(), message: "produced invalid output".into() }.to_string(),
                ));
            }
        }
        Ok(TemporalConfig { scalar, timezone, parser, format })
    }

    fn parse_datetime(&self, value: &Value) -> Option<DateTime<Tz>> {
        match self.parser {
            DateParser::Iso => {
                let mut s = scalar_to_string(value);
                if s.ends_with('Z') {
                    s = format!("{}+00:00", &s[..s.len() - 1]);
                }
                let parsed = DateTime::parse_from_rfc3339(&s).ok()?;
                Some(parsed.with_timezone(&self.timezone))
            }
            DateParser::Unix => {
                let secs = as_f64(value)?;
                let naive = chrono::DateTime::from_timestamp(secs as i64, ((secs.fract()) * 1e9) as u32)?;
                Some(naive.with_timezone(&self.timezone))
            }
            DateParser::Custom => {
                let s = scalar_to_string(value);
                let fmt = self.format.as_deref()?;
                let naive = chrono::NaiveDateTime::parse_from_str(&s, fmt).ok()?;
                self.timezone.from_local_datetime(&naive).single()
            }
        }
    }
}

pub struct DatetimeColumn(TemporalConfig);

impl DatetimeColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(DatetimeColumn(TemporalConfig::from_fragment(fragment)?)))
    }
}

impl Column for DatetimeColumn {
    fn extractor_name(&self) -> &str {
        &self.0.scalar.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.scalar.processed(extractor, payload, bindings)?;
        match self.0.parse_datetime(&v) {
            Some(dt) => Some(ColumnValue::Datetime(dt)),
            None => {
                log_cast_failure(&self.0.scalar.path, &v, "datetime", "value does not parse under the configured parser");
                None
            }
        }
    }
}

pub struct DateColumn(TemporalConfig);

impl DateColumn {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Column>, ConfigError> {
        Ok(Box::new(DateColumn(TemporalConfig::from_fragment(fragment)?)))
    }
}

impl Column for DateColumn {
    fn extractor_name(&self) -> &str {
        &self.0.scalar.extractor_name
    }

    fn value(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Option<ColumnValue> {
        let v = self.0.scalar.processed(extractor, payload, bindings)?;
        let date: Option<NaiveDate> = match self.0.parser {
            DateParser::Iso => NaiveDate::parse_from_str(&scalar_to_string(&v), "%Y-%m-%d").ok(),
            _ => self.0.parse_datetime(&v).map(|dt| dt.naive_local().date()),
        };
        match date {
            Some(d) => Some(ColumnValue::Date(d)),
            None => {
                log_cast_failure(&self.0.scalar.path, &v, "date", "value does not parse under the configured parser");
                None
            }
        }
    }
}

pub fn registry() -> &'static Registry<Box<dyn Column>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Column>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("column"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("string", StringColumn::construct).expect("default columns register exactly once");
        reg.bind("integer", IntegerColumn::construct).expect("default columns register exactly once");
        reg.bind("float", FloatColumn::construct).expect("default columns register exactly once");
        reg.bind("boolean", BooleanColumn::construct).expect("default columns register exactly once");
        reg.bind("datetime", DatetimeColumn::construct).expect("default columns register exactly once");
        reg.bind("date", DateColumn::construct).expect("default columns register exactly once");
    });
}
