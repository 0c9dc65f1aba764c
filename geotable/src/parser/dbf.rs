//! Parser pour les fichiers DBF (attributs dBASE III/IV)

use chrono::NaiveDate;
use encoding_rs::Encoding;

use crate::table::{Value, ValueType};
use crate::types::{DbfField, DbfHeader, FieldType};
use crate::GeoTableError;

const FIELD_DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

/// Parse l'en-tête et les descripteurs de champs
pub fn parse_header(data: &[u8], encoding: &'static Encoding) -> Result<DbfHeader, GeoTableError> {
    if data.len() < 32 {
        return Err(GeoTableError::invalid_file(
            "dbf",
            format!("header truncated ({} bytes)", data.len()),
        ));
    }

    let header_length = u16::from_le_bytes([data[8], data[9]]);
    let record_length = u16::from_le_bytes([data[10], data[11]]);

    let mut fields = Vec::new();
    let mut offset = 32;
    while offset + FIELD_DESCRIPTOR_LEN <= data.len()
        && offset < header_length as usize
        && data[offset] != HEADER_TERMINATOR
    {
        let descriptor = &data[offset..offset + FIELD_DESCRIPTOR_LEN];
        let name_end = descriptor[..11].iter().position(|&b| b == 0).unwrap_or(11);
        fields.push(DbfField {
            name: decode_text(&descriptor[..name_end], encoding).trim().to_string(),
            field_type: FieldType::from_byte(descriptor[11]),
            length: descriptor[16],
            decimal_count: descriptor[17],
        });
        offset += FIELD_DESCRIPTOR_LEN;
    }

    let declared: usize = fields.iter().map(|f| f.length as usize).sum::<usize>() + 1;
    if declared != record_length as usize {
        return Err(GeoTableError::invalid_file(
            "dbf",
            format!(
                "record length {} does not match field lengths ({})",
                record_length, declared
            ),
        ));
    }

    Ok(DbfHeader {
        version: data[0],
        last_update: NaiveDate::from_ymd_opt(1900 + data[1] as i32, data[2] as u32, data[3] as u32),
        num_records: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        header_length,
        record_length,
        language_driver: data[29],
        fields,
    })
}

/// Parse tous les enregistrements (y compris ceux marqués supprimés,
/// pour garder la correspondance positionnelle avec le .shp)
pub fn parse_records(
    data: &[u8],
    header: &DbfHeader,
    encoding: &'static Encoding,
) -> Result<Vec<Vec<Value>>, GeoTableError> {
    let record_length = (header.record_length as usize).max(1);
    let num_records = header.num_records as usize;
    let available = data.len().saturating_sub(header.header_length as usize) / record_length;
    if num_records > available {
        return Err(GeoTableError::invalid_file(
            "dbf",
            format!("{} records declared, only {} present", num_records, available),
        ));
    }
    let mut records = Vec::with_capacity(num_records);

    for i in 0..num_records {
        let start = header.header_length as usize + i * record_length;
        let record = data.get(start..start + record_length).ok_or_else(|| {
            GeoTableError::invalid_file(
                "dbf",
                format!("record {} truncated at byte {}", i, start),
            )
        })?;

        if record[0] == DELETED_FLAG {
            tracing::debug!(record = i, "Deleted dBASE record kept for alignment");
        }

        let mut values = Vec::with_capacity(header.fields.len());
        let mut offset = 1;
        for field in &header.fields {
            let raw = &record[offset..offset + field.length as usize];
            values.push(parse_value(field, raw, encoding));
            offset += field.length as usize;
        }
        records.push(values);
    }

    Ok(records)
}

/// Décode une valeur de champ. Une valeur illisible devient `Null`.
fn parse_value(field: &DbfField, raw: &[u8], encoding: &'static Encoding) -> Value {
    match field.field_type {
        FieldType::Character => Value::Text(decode_text(raw, encoding).trim().to_string()),
        FieldType::Numeric | FieldType::Float => parse_number(field, raw),
        FieldType::Logical => match raw.first() {
            Some(b'T' | b't' | b'Y' | b'y') => Value::Boolean(true),
            Some(b'F' | b'f' | b'N' | b'n') => Value::Boolean(false),
            _ => Value::Null,
        },
        FieldType::Date => parse_date(raw),
        FieldType::Integer if raw.len() == 4 => {
            Value::Int32(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }
        FieldType::Double if raw.len() == 8 => Value::Float(f64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ])),
        FieldType::Integer | FieldType::Double => Value::Null,
        FieldType::Memo | FieldType::Other(_) => {
            let text = decode_text(raw, encoding);
            let text = text.trim();
            if text.is_empty() {
                Value::Null
            } else {
                Value::Text(text.to_string())
            }
        }
    }
}

fn parse_number(field: &DbfField, raw: &[u8]) -> Value {
    let Ok(text) = std::str::from_utf8(raw) else {
        return Value::Null;
    };
    let text = text.trim().trim_matches('\0');
    // Champ vide ou débordement (rempli d'astérisques)
    if text.is_empty() || text.starts_with('*') {
        return Value::Null;
    }

    let parsed: Option<f64> = fast_float::parse(text).ok();
    let value = match (field.value_type(), parsed) {
        (_, None) => None,
        (ValueType::Int32, Some(_)) => text.parse::<i32>().ok().map(Value::Int32),
        (ValueType::Decimal, Some(_)) => Some(Value::Decimal(text.to_string())),
        (_, Some(v)) => Some(Value::Float(v)),
    };

    value.unwrap_or_else(|| {
        tracing::debug!(field = %field.name, value = text, "Unreadable numeric value");
        Value::Null
    })
}

fn parse_date(raw: &[u8]) -> Value {
    let Ok(text) = std::str::from_utf8(raw) else {
        return Value::Null;
    };
    let text = text.trim();
    if text.len() != 8 || !text.is_ascii() {
        return Value::Null;
    }

    let year = text[0..4].parse::<i32>();
    let month = text[4..6].parse::<u32>();
    let day = text[6..8].parse::<u32>();
    match (year, month, day) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Décode du texte (chemin rapide SIMD pour l'UTF-8)
fn decode_text(raw: &[u8], encoding: &'static Encoding) -> String {
    if encoding == encoding_rs::UTF_8 {
        if let Ok(s) = simdutf8::basic::from_utf8(raw) {
            return s.to_string();
        }
    }
    let (decoded, _, _) = encoding.decode(raw);
    decoded.into_owned()
}

/// Choisit l'encodage: fichier .cpg, puis pilote de langue, puis Windows-1252
pub fn detect_encoding(cpg: Option<&[u8]>, language_driver: u8) -> &'static Encoding {
    if let Some(label) = cpg {
        if let Some(encoding) = cpg_to_encoding(label) {
            return encoding;
        }
        tracing::warn!(
            cpg = %String::from_utf8_lossy(label).trim(),
            "Unknown code page in .cpg file, falling back to language driver"
        );
    }
    ldid_to_encoding(language_driver)
}

/// Mappe le contenu d'un .cpg ("UTF-8", "1252", "ISO-8859-1"...)
fn cpg_to_encoding(label: &[u8]) -> Option<&'static Encoding> {
    let label = String::from_utf8_lossy(label);
    let label = label.trim();

    if let Ok(code_page) = label.parse::<u32>() {
        return match code_page {
            65001 => Some(encoding_rs::UTF_8),
            874 => Some(encoding_rs::WINDOWS_874),
            932 => Some(encoding_rs::SHIFT_JIS),
            936 => Some(encoding_rs::GBK),
            949 => Some(encoding_rs::EUC_KR),
            950 => Some(encoding_rs::BIG5),
            1250..=1258 => Encoding::for_label(format!("windows-{}", code_page).as_bytes()),
            28591..=28599 => {
                Encoding::for_label(format!("iso-8859-{}", code_page - 28590).as_bytes())
            }
            _ => None,
        };
    }

    Encoding::for_label(label.as_bytes())
}

/// Mappe l'identifiant de pilote de langue (octet 29 de l'en-tête)
fn ldid_to_encoding(language_driver: u8) -> &'static Encoding {
    match language_driver {
        0x13 | 0x7B => encoding_rs::SHIFT_JIS,
        0x26 | 0x65 => encoding_rs::IBM866,
        0x4D | 0x7A => encoding_rs::GBK,
        0x4E | 0x79 => encoding_rs::EUC_KR,
        0x4F | 0x78 => encoding_rs::BIG5,
        0x57 | 0x03 | 0x58 | 0x59 => encoding_rs::WINDOWS_1252,
        0x7C | 0xF0 => encoding_rs::WINDOWS_874,
        0x7D => encoding_rs::WINDOWS_1255,
        0x7E => encoding_rs::WINDOWS_1256,
        0xC8 => encoding_rs::WINDOWS_1250,
        0xC9 => encoding_rs::WINDOWS_1251,
        0xCA => encoding_rs::WINDOWS_1254,
        0xCB => encoding_rs::WINDOWS_1253,
        0xCC => encoding_rs::WINDOWS_1257,
        // 0x00 (non renseigné), pages DOS non gérées par encoding_rs
        _ => encoding_rs::WINDOWS_1252,
    }
}
