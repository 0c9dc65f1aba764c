//! Parser pour les fichiers PRJ (système de coordonnées en WKT)

use memchr::memmem;

/// Noms de systèmes de coordonnées courants vers EPSG (WKT ESRI et OGC)
const PROJECTIONS: &[(&str, i32)] = &[
    ("RGF93_Lambert_93", 2154),
    ("RGF93 / Lambert-93", 2154),
    ("RGF93_v1_Lambert_93", 2154),
    ("WGS_1984_Web_Mercator_Auxiliary_Sphere", 3857),
    ("WGS 84 / Pseudo-Mercator", 3857),
    ("GDA_1994_MGA_Zone_54", 28354),
    ("GDA_1994_MGA_Zone_55", 28355),
    ("GDA_1994_MGA_Zone_56", 28356),
    ("GCS_WGS_1984", 4326),
    ("WGS 84", 4326),
    ("WGS84", 4326),
    ("GCS_GDA_1994", 4283),
    ("GDA94", 4283),
    ("GCS_North_American_1983", 4269),
    ("NAD83", 4269),
    ("GCS_ETRS_1989", 4258),
    ("ETRS89", 4258),
    ("GCS_RGF_1993", 4171),
    ("RGF93", 4171),
];

/// Déduit le SRID d'un fichier .prj. `None` si le système n'est pas reconnu.
pub fn parse(data: &[u8]) -> Option<i32> {
    if let Some(epsg) = outer_authority(data) {
        return Some(epsg);
    }

    let content = String::from_utf8_lossy(data);
    if let Some(name) = wkt_name(&content, "PROJCS[\"") {
        return lookup(name).or_else(|| utm_zone(name));
    }
    wkt_name(&content, "GEOGCS[\"").and_then(lookup)
}

/// Dernier `AUTHORITY["EPSG",...]` du WKT (celui de l'objet racine)
fn outer_authority(data: &[u8]) -> Option<i32> {
    let needle = b"AUTHORITY[\"EPSG\",";
    let pos = memmem::rfind(data, needle)?;
    let rest = &data[pos + needle.len()..];

    let digits: Vec<u8> = rest
        .iter()
        .skip_while(|&&b| b == b'"' || b == b' ')
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    std::str::from_utf8(&digits).ok()?.parse().ok()
}

fn wkt_name<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let start = content.find(prefix)? + prefix.len();
    let len = content[start..].find('"')?;
    Some(&content[start..start + len])
}

fn lookup(name: &str) -> Option<i32> {
    PROJECTIONS
        .iter()
        .find(|(known, _)| name.eq_ignore_ascii_case(known))
        .map(|&(_, epsg)| epsg)
}

/// "WGS_1984_UTM_Zone_31N" / "WGS 84 / UTM zone 31N"
fn utm_zone(name: &str) -> Option<i32> {
    let upper = name.to_ascii_uppercase();
    if !upper.contains("WGS") {
        return None;
    }
    let pos = upper.find("UTM_ZONE_").map(|p| p + 9).or_else(|| upper.find("UTM ZONE ").map(|p| p + 9))?;
    let rest = &upper[pos..];

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: i32 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    match rest[digits.len()..].chars().next() {
        Some('N') => Some(32600 + zone),
        Some('S') => Some(32700 + zone),
        _ => None,
    }
}
