//! TopoJSON decoding.
//!
//! A topology stores every boundary once in a shared `arcs` array; geometry
//! objects reference arcs by index (negative index `~i` walks arc `i`
//! backwards). Decoding stitches arcs back into GeoJSON coordinates and then
//! converts them into `geo` geometries.

use std::collections::BTreeMap;

use geo::Geometry;
use geojson::{JsonObject, PointType};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{DecodeError, LoadError},
    feature::{Feature, FeatureSet},
};

/// Raw topology document as it arrives over the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<Transform>,
    pub objects: BTreeMap<String, GeometryObject>,
    #[serde(default)]
    pub arcs: Vec<Vec<Vec<f64>>>,
}

/// Quantization transform: `position = quantized * scale + translate`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

impl Transform {
    fn apply(&self, x: f64, y: f64) -> PointType {
        vec![
            x * self.scale[0] + self.translate[0],
            y * self.scale[1] + self.translate[1],
        ]
    }
}

/// One named (or nested) geometry object.
#[derive(Clone, Debug, Deserialize)]
pub struct GeometryObject {
    /// `None` when the document says `"type": null`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub properties: Option<JsonObject>,
    #[serde(default)]
    pub arcs: Option<Value>,
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default)]
    pub geometries: Vec<GeometryObject>,
}

/// Names of every top-level object in the document.
pub fn object_names(topology: &Topology) -> Vec<String> {
    topology.objects.keys().cloned().collect()
}

/// Decodes the object named `key` into a feature set.
///
/// A `GeometryCollection` yields one feature per member; any other object is
/// wrapped into a one-element set.
pub fn decode(topology: &Topology, key: &str) -> Result<FeatureSet, DecodeError> {
    let object = topology.objects.get(key).ok_or_else(|| DecodeError::MissingObject {
        key: key.to_string(),
        available: object_names(topology),
    })?;

    let arcs = ArcTable::new(topology)?;
    if object.kind.as_deref() == Some("GeometryCollection") {
        object.geometries.iter().map(|g| arcs.feature(g)).collect()
    } else {
        Ok(vec![arcs.feature(object)?])
    }
}

/// Parses a JSON document and decodes `key` from it.
pub fn decode_document(bytes: &[u8], key: &str) -> Result<FeatureSet, LoadError> {
    let topology: Topology = serde_json::from_slice(bytes)?;
    let features = decode(&topology, key).inspect_err(|err| {
        if let DecodeError::MissingObject { .. } = err {
            tracing::warn!(objects = ?object_names(&topology), "requested object '{}' is absent", key);
        }
    })?;
    Ok(features)
}

/// Arcs with quantization and delta encoding already undone.
struct ArcTable {
    arcs: Vec<Vec<PointType>>,
    transform: Option<Transform>,
}

impl ArcTable {
    fn new(topology: &Topology) -> Result<Self, DecodeError> {
        let mut arcs = Vec::with_capacity(topology.arcs.len());
        for raw in &topology.arcs {
            let mut decoded = Vec::with_capacity(raw.len());
            let (mut x, mut y) = (0.0, 0.0);
            for p in raw {
                if p.len() < 2 {
                    return Err(DecodeError::InvalidCoordinates("arc"));
                }
                match &topology.transform {
                    Some(t) => {
                        x += p[0];
                        y += p[1];
                        decoded.push(t.apply(x, y));
                    }
                    None => decoded.push(vec![p[0], p[1]]),
                }
            }
            arcs.push(decoded);
        }
        Ok(Self { arcs, transform: topology.transform })
    }

    fn feature(&self, object: &GeometryObject) -> Result<Feature, DecodeError> {
        let geometry = match self.value(object)? {
            Some(value) => {
                let geometry: Geometry<f64> = value
                    .try_into()
                    .map_err(|_| DecodeError::InvalidCoordinates("geometry"))?;
                Some(geometry)
            }
            None => None,
        };
        Ok(Feature {
            id: object.id.clone(),
            geometry,
            properties: object.properties.clone().unwrap_or_default(),
        })
    }

    fn value(&self, object: &GeometryObject) -> Result<Option<geojson::Value>, DecodeError> {
        let Some(kind) = object.kind.as_deref() else {
            return Ok(None);
        };
        let value = match kind {
            "Point" => geojson::Value::Point(self.point(coordinates(object, "Point")?)?),
            "MultiPoint" => {
                let points: Vec<Value> = parse(coordinates(object, "MultiPoint")?, "MultiPoint")?;
                geojson::Value::MultiPoint(
                    points.iter().map(|p| self.point(p)).collect::<Result<_, _>>()?,
                )
            }
            "LineString" => {
                let arcs: Vec<i64> = parse(arc_refs(object, "LineString")?, "LineString")?;
                geojson::Value::LineString(self.line(&arcs)?)
            }
            "MultiLineString" => {
                let lines: Vec<Vec<i64>> = parse(arc_refs(object, "MultiLineString")?, "MultiLineString")?;
                geojson::Value::MultiLineString(
                    lines.iter().map(|l| self.line(l)).collect::<Result<_, _>>()?,
                )
            }
            "Polygon" => {
                let rings: Vec<Vec<i64>> = parse(arc_refs(object, "Polygon")?, "Polygon")?;
                geojson::Value::Polygon(self.polygon(&rings)?)
            }
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<i64>>> = parse(arc_refs(object, "MultiPolygon")?, "MultiPolygon")?;
                geojson::Value::MultiPolygon(
                    polygons.iter().map(|p| self.polygon(p)).collect::<Result<_, _>>()?,
                )
            }
            "GeometryCollection" => {
                let mut members = Vec::with_capacity(object.geometries.len());
                for member in &object.geometries {
                    if let Some(value) = self.value(member)? {
                        members.push(geojson::Geometry::new(value));
                    }
                }
                geojson::Value::GeometryCollection(members)
            }
            other => return Err(DecodeError::UnsupportedGeometry(other.to_string())),
        };
        Ok(Some(value))
    }

    fn point(&self, raw: &Value) -> Result<PointType, DecodeError> {
        let p: Vec<f64> = parse(raw, "Point")?;
        if p.len() < 2 {
            return Err(DecodeError::InvalidCoordinates("Point"));
        }
        // Quantized points are absolute, never delta-encoded.
        Ok(match &self.transform {
            Some(t) => t.apply(p[0], p[1]),
            None => vec![p[0], p[1]],
        })
    }

    fn line(&self, arcs: &[i64]) -> Result<Vec<PointType>, DecodeError> {
        let mut points: Vec<PointType> = Vec::new();
        for &index in arcs {
            self.append_arc(index, &mut points)?;
        }
        if points.len() == 1 {
            points.push(points[0].clone());
        }
        Ok(points)
    }

    fn ring(&self, arcs: &[i64]) -> Result<Vec<PointType>, DecodeError> {
        let mut points = self.line(arcs)?;
        while !points.is_empty() && points.len() < 4 {
            points.push(points[0].clone());
        }
        Ok(points)
    }

    fn polygon(&self, rings: &[Vec<i64>]) -> Result<Vec<Vec<PointType>>, DecodeError> {
        rings.iter().map(|r| self.ring(r)).collect()
    }

    fn append_arc(&self, index: i64, points: &mut Vec<PointType>) -> Result<(), DecodeError> {
        let (slot, reversed) = if index < 0 { (!index, true) } else { (index, false) };
        let arc = usize::try_from(slot)
            .ok()
            .and_then(|i| self.arcs.get(i))
            .ok_or(DecodeError::ArcOutOfRange { index, len: self.arcs.len() })?;

        // The joint point is shared with the previous arc.
        points.pop();
        if reversed {
            points.extend(arc.iter().rev().cloned());
        } else {
            points.extend(arc.iter().cloned());
        }
        Ok(())
    }
}

fn coordinates<'a>(object: &'a GeometryObject, kind: &'static str) -> Result<&'a Value, DecodeError> {
    object.coordinates.as_ref().ok_or(DecodeError::InvalidCoordinates(kind))
}

fn arc_refs<'a>(object: &'a GeometryObject, kind: &'static str) -> Result<&'a Value, DecodeError> {
    object.arcs.as_ref().ok_or(DecodeError::InvalidCoordinates(kind))
}

fn parse<T: serde::de::DeserializeOwned>(raw: &Value, kind: &'static str) -> Result<T, DecodeError> {
    T::deserialize(raw).map_err(|_| DecodeError::InvalidCoordinates(kind))
}
