//! Correspondance entre types PostgreSQL et valeurs `geotable`
//!
//! * lecture: `PgValue` décode une cellule (binaire) en `Value`
//! * écriture: `value_type_to_column_type` donne le type de colonne cible et
//!   `write_csv_value` la représentation attendue par `COPY ... (FORMAT csv)`

use std::error::Error;
use std::fmt::{self, Write as _};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use geotable::{SpatialKind, SpatialValue, Value, ValueType};
use tokio_postgres::types::{FromSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// Classe d'une colonne de résultat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Spatial(SpatialKind),
    Attribute(ValueType),
}

/// Classe une colonne d'après son type PostgreSQL.
///
/// `None` pour les types non pris en charge.
pub fn classify(ty: &Type) -> Option<ColumnClass> {
    // Types PostGIS: extensions, OID variable selon la base
    match ty.name() {
        "geometry" => return Some(ColumnClass::Spatial(SpatialKind::Geometry)),
        "geography" => return Some(ColumnClass::Spatial(SpatialKind::Geography)),
        _ => {}
    }

    let value_type = match *ty {
        Type::FLOAT4 | Type::FLOAT8 => ValueType::Float,
        Type::NUMERIC => ValueType::Decimal,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => ValueType::Text,
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => ValueType::DateTime,
        Type::INT2 | Type::INT4 => ValueType::Int32,
        Type::INT8 => ValueType::Int64,
        Type::BOOL => ValueType::Boolean,
        _ => return None,
    };
    Some(ColumnClass::Attribute(value_type))
}

/// Cellule PostgreSQL décodée
#[derive(Debug, Clone, PartialEq)]
pub struct PgValue(pub Value);

impl PgValue {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl<'a> FromSql<'a> for PgValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let class = classify(ty).ok_or_else(|| format!("unsupported column type {}", ty))?;

        let value = match class {
            ColumnClass::Spatial(kind) => Value::Spatial(SpatialValue::from_ewkb(kind, raw)?),
            ColumnClass::Attribute(ValueType::Float) => match *ty {
                Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)? as f64),
                _ => Value::Float(f64::from_sql(ty, raw)?),
            },
            ColumnClass::Attribute(ValueType::Decimal) => Value::Decimal(decode_numeric(raw)?),
            ColumnClass::Attribute(ValueType::Text) => Value::Text(String::from_sql(ty, raw)?),
            // Les valeurs hors plage (dont `infinity`) sont refusées au décodage
            ColumnClass::Attribute(ValueType::DateTime) => Value::DateTime(match *ty {
                Type::DATE => NaiveDate::from_sql(ty, raw)?.and_time(NaiveTime::MIN),
                Type::TIMESTAMPTZ => DateTime::<Utc>::from_sql(ty, raw)?.naive_utc(),
                _ => NaiveDateTime::from_sql(ty, raw)?,
            }),
            ColumnClass::Attribute(ValueType::Int32) => match *ty {
                Type::INT2 => Value::Int32(i16::from_sql(ty, raw)? as i32),
                _ => Value::Int32(i32::from_sql(ty, raw)?),
            },
            ColumnClass::Attribute(ValueType::Int64) => Value::Int64(i64::from_sql(ty, raw)?),
            ColumnClass::Attribute(ValueType::Boolean) => Value::Boolean(bool::from_sql(ty, raw)?),
            ColumnClass::Attribute(other) => {
                return Err(format!("no decoder for {:?}", other).into());
            }
        };
        Ok(PgValue(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(PgValue(Value::Null))
    }

    fn accepts(ty: &Type) -> bool {
        classify(ty).is_some()
    }
}

/// Décode le format binaire NUMERIC en texte décimal exact
///
/// Layout: ndigits, weight, sign, dscale (i16/u16 big-endian) puis `ndigits`
/// chiffres en base 10000.
pub fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid numeric length".into());
    }
    let ndigits = i16::from_be_bytes([raw[0], raw[1]]);
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    if ndigits < 0 || raw.len() != 8 + ndigits as usize * 2 {
        return Err("invalid numeric length".into());
    }
    let digits: Vec<i16> = raw[8..]
        .chunks_exact(2)
        .map(|c| i16::from_be_bytes([c[0], c[1]]))
        .collect();

    match sign {
        0x0000 | 0x4000 => {}
        0xC000 => return Ok("NaN".into()),
        0xD000 => return Ok("Infinity".into()),
        0xF000 => return Ok("-Infinity".into()),
        other => return Err(format!("invalid numeric sign 0x{:04x}", other).into()),
    }

    let digit = |i: i32| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                write!(out, "{}", digit(i))?;
            } else {
                write!(out, "{:04}", digit(i))?;
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", digit(i))?;
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Type de colonne de destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    DoublePrecision,
    Numeric { precision: u8, scale: u8 },
    Varchar(u32),
    Timestamp,
    Integer,
    Geography,
    Geometry,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::DoublePrecision => f.write_str("double precision"),
            ColumnType::Numeric { precision, scale } => write!(f, "numeric({}, {})", precision, scale),
            ColumnType::Varchar(len) => write!(f, "varchar({})", len),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Integer => f.write_str("integer"),
            ColumnType::Geography => f.write_str("geography"),
            ColumnType::Geometry => f.write_str("geometry"),
        }
    }
}

/// Table de correspondance fermée type de valeur → type de colonne.
///
/// Les types hors table sont refusés.
pub fn value_type_to_column_type(value_type: ValueType) -> Result<ColumnType> {
    Ok(match value_type {
        ValueType::Float => ColumnType::DoublePrecision,
        ValueType::Decimal => ColumnType::Numeric {
            precision: 18,
            scale: 2,
        },
        ValueType::Text => ColumnType::Varchar(50),
        ValueType::DateTime => ColumnType::Timestamp,
        ValueType::Int32 => ColumnType::Integer,
        ValueType::Geography => ColumnType::Geography,
        ValueType::Geometry => ColumnType::Geometry,
        ValueType::Int64 | ValueType::Boolean => {
            anyhow::bail!("No column type mapping for {:?}", value_type)
        }
    })
}

/// Écrit une valeur au format CSV de `COPY` (`NULL ''`, guillemets `"`)
///
/// Le texte est toujours entre guillemets pour distinguer `""` de NULL.
pub fn write_csv_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Float(v) if v.is_nan() => out.push_str("NaN"),
        Value::Float(v) if v.is_infinite() => {
            out.push_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        }
        Value::Float(v) => write!(out, "{}", v)?,
        Value::Decimal(v) => out.push_str(v),
        Value::Text(v) => push_quoted(out, v),
        Value::DateTime(v) => write!(out, "{}", v)?,
        Value::Int32(v) => write!(out, "{}", v)?,
        Value::Int64(v) => write!(out, "{}", v)?,
        Value::Boolean(v) => out.push(if *v { 't' } else { 'f' }),
        Value::Spatial(v) => push_quoted(out, &v.to_ewkt()?),
    }
    Ok(())
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Identifiant SQL entre guillemets
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
