//! Sérialisation GeoJSON des chemins (géométrie via geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::error::GeozeroError;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use overpass::LineFeature;

/// Sérialise des chemins en `FeatureCollection` GeoJSON
///
/// Propriétés: `id`, `highway`, `name`, `surface` (`null` si absent).
pub fn write_feature_collection<W: Write>(
    writer: &mut W,
    features: &[LineFeature],
) -> Result<(), GeozeroError> {
    write!(writer, r#"{{"type":"FeatureCollection","features":["#)?;

    for (i, feature) in features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Sérialise en mémoire (backing d'un overlay)
pub fn to_bytes(features: &[LineFeature]) -> Result<Vec<u8>, GeozeroError> {
    let mut buf = Vec::with_capacity(features.len() * 256);
    write_feature_collection(&mut buf, features)?;
    Ok(buf)
}

/// Exporte des chemins dans un fichier GeoJSON
pub fn export_to_geojson(features: &[LineFeature], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    write_feature_collection(&mut writer, features)
        .context(format!("Failed to write GeoJSON: {}", output_path.display()))?;
    writer.flush()?;

    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, feature: &LineFeature) -> Result<(), GeozeroError> {
    write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, feature.id)?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::LineString(feature.geometry.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"id":{}"#, feature.id)?;
    for (key, value) in [
        ("highway", &feature.tags.highway),
        ("name", &feature.tags.name),
        ("surface", &feature.tags.surface),
    ] {
        write!(writer, r#","{}":"#, key)?;
        write_opt_str(writer, value.as_deref())?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

/// Écrit une chaîne JSON échappée, ou `null`
fn write_opt_str<W: Write>(writer: &mut W, value: Option<&str>) -> std::io::Result<()> {
    let Some(s) = value else {
        return writer.write_all(b"null");
    };

    writer.write_all(b"\"")?;
    for c in s.chars() {
        match c {
            '"' => writer.write_all(b"\\\"")?,
            '\\' => writer.write_all(b"\\\\")?,
            '\n' => writer.write_all(b"\\n")?,
            '\r' => writer.write_all(b"\\r")?,
            '\t' => writer.write_all(b"\\t")?,
            c if c.is_control() => write!(writer, "\\u{:04x}", c as u32)?,
            c => write!(writer, "{}", c)?,
        }
    }
    writer.write_all(b"\"")
}
