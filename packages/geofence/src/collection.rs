//! Risk-annotated geofences and the immutable collection that holds them.
//!
//! Zones come from a `GeoJSON` `FeatureCollection` whose feature properties
//! carry a station-name-like identifier, a `risk_level` and usually a
//! `safety_score`. The property names are configurable through
//! [`GeofenceSchema`].

use std::collections::BTreeSet;

use geo::{Coord, Line, MultiPolygon};
use geojson::{Feature, FeatureCollection};
use safe_route_geofence_models::{RiskLevel, RiskThresholds};
use safe_route_spatial::{ZoneGeometry, ZoneIndex, parse_boundary};
use serde::{Deserialize, Serialize};

use crate::GeofenceError;

/// Feature properties passed through untouched.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Which feature properties hold the zone identifier, risk and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceSchema {
    /// Properties tried in order for the identifier; first non-empty wins.
    pub id_properties: Vec<String>,
    /// Property holding `safe` / `caution` / `forbidden`.
    pub risk_property: String,
    /// Property holding the safety score (probability of the safe class).
    pub score_property: String,
    /// Property holding the model's predicted label.
    pub label_property: String,
    /// Cut-offs used when the risk has to be derived from the score.
    pub thresholds: RiskThresholds,
}

impl Default for GeofenceSchema {
    fn default() -> Self {
        Self {
            id_properties: vec![
                "station_name".to_string(),
                "POL_STN_NM".to_string(),
                "station_id".to_string(),
                "name".to_string(),
            ],
            risk_property: "risk_level".to_string(),
            score_property: "safety_score".to_string(),
            label_property: "predicted_label".to_string(),
            thresholds: RiskThresholds::default(),
        }
    }
}

/// A named zone with a boundary and a risk classification.
#[derive(Debug, Clone)]
pub struct Geofence<B = MultiPolygon<f64>> {
    id: String,
    boundary: B,
    risk_level: Option<RiskLevel>,
    safety_score: Option<f64>,
    properties: Properties,
}

impl<B> Geofence<B> {
    /// Creates a zone. `risk_level` is `None` when the source value was
    /// missing or unrecognized.
    #[must_use]
    pub fn new(id: impl Into<String>, boundary: B, risk_level: Option<RiskLevel>) -> Self {
        Self {
            id: id.into(),
            boundary,
            risk_level,
            safety_score: None,
            properties: Properties::new(),
        }
    }

    /// Attaches a safety score.
    #[must_use]
    pub const fn with_safety_score(mut self, safety_score: f64) -> Self {
        self.safety_score = Some(safety_score);
        self
    }

    /// Attaches pass-through properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn boundary(&self) -> &B {
        &self.boundary
    }

    /// The recognized risk level, if any.
    #[must_use]
    pub const fn risk_level(&self) -> Option<RiskLevel> {
        self.risk_level
    }

    /// Risk used for display and alerts; unknown resolves to forbidden.
    #[must_use]
    pub fn styling_risk(&self) -> RiskLevel {
        RiskLevel::or_styling_default(self.risk_level)
    }

    /// Risk used when folding segment severity; unknown resolves to safe.
    #[must_use]
    pub fn fold_risk(&self) -> RiskLevel {
        RiskLevel::or_fold_default(self.risk_level)
    }

    #[must_use]
    pub const fn safety_score(&self) -> Option<f64> {
        self.safety_score
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }
}

impl<B: ZoneGeometry> Geofence<B> {
    /// Whether the zone contains `point`.
    ///
    /// A malformed boundary counts as not containing the point and is
    /// logged, so one broken zone never stops evaluation of the others.
    #[must_use]
    pub fn contains(&self, point: Coord<f64>) -> bool {
        self.boundary.contains_point(point).unwrap_or_else(|e| {
            log::warn!("Skipping containment test for geofence {}: {e}", self.id);
            false
        })
    }

    /// Whether `segment` touches or crosses the zone.
    ///
    /// A malformed boundary counts as no intersection and is logged.
    #[must_use]
    pub fn intersects(&self, segment: Line<f64>) -> bool {
        self.boundary.intersects_segment(segment).unwrap_or_else(|e| {
            log::warn!("Skipping intersection test for geofence {}: {e}", self.id);
            false
        })
    }
}

/// An immutable snapshot of geofences with an envelope index.
///
/// Identifiers are unique. Refreshing zone data means building a new
/// collection, never mutating an existing one.
pub struct GeofenceCollection<B = MultiPolygon<f64>> {
    geofences: Vec<Geofence<B>>,
    index: ZoneIndex,
}

impl<B: ZoneGeometry> GeofenceCollection<B> {
    /// Builds a collection, keeping the first geofence for any repeated
    /// identifier.
    #[must_use]
    pub fn new(geofences: Vec<Geofence<B>>) -> Self {
        let mut seen = BTreeSet::new();
        let geofences: Vec<Geofence<B>> = geofences
            .into_iter()
            .filter(|geofence| {
                let fresh = seen.insert(geofence.id.clone());
                if !fresh {
                    log::warn!("Dropping duplicate geofence {}", geofence.id);
                }
                fresh
            })
            .collect();

        let index = ZoneIndex::build(geofences.iter().map(|g| &g.boundary));

        Self { geofences, index }
    }

    /// An empty collection.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.geofences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geofences.is_empty()
    }

    /// All geofences in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, Geofence<B>> {
        self.geofences.iter()
    }

    /// Looks up a geofence by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Geofence<B>> {
        self.geofences.iter().find(|g| g.id == id)
    }

    /// Geofences whose envelope covers `point`, in load order. Exact
    /// containment is not tested.
    pub fn near(&self, point: Coord<f64>) -> impl Iterator<Item = &Geofence<B>> {
        self.index
            .candidates_for_point(point)
            .into_iter()
            .map(move |slot| &self.geofences[slot])
    }

    /// Geofences that contain `point`, in load order.
    pub fn containing(&self, point: Coord<f64>) -> impl Iterator<Item = &Geofence<B>> {
        self.near(point)
            .filter(move |geofence| geofence.contains(point))
    }

    /// Geofences that `segment` touches or crosses, in load order.
    pub fn intersecting(&self, segment: Line<f64>) -> impl Iterator<Item = &Geofence<B>> {
        self.index
            .candidates_for_segment(segment)
            .into_iter()
            .map(move |slot| &self.geofences[slot])
            .filter(move |geofence| geofence.intersects(segment))
    }
}

impl GeofenceCollection<MultiPolygon<f64>> {
    /// Parses a `GeoJSON` string holding a `FeatureCollection` (a single
    /// `Feature` is accepted too).
    ///
    /// Features are decoded one at a time, so a feature with a malformed
    /// position or geometry is skipped with a warning instead of failing
    /// the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not JSON, is not a feature or
    /// feature collection, or a collection lacks its `features` array.
    pub fn from_geojson_str(raw: &str, schema: &GeofenceSchema) -> Result<Self, GeofenceError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let serde_json::Value::Object(mut object) = value else {
            return Err(GeofenceError::NotAFeatureCollection {
                found: "non-object".to_string(),
            });
        };

        let kind = object
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        let features = match kind.as_deref() {
            Some("FeatureCollection") => match object.remove("features") {
                Some(serde_json::Value::Array(features)) => features,
                _ => return Err(GeofenceError::MissingFeatures),
            },
            Some("Feature") => vec![serde_json::Value::Object(object)],
            other => {
                return Err(GeofenceError::NotAFeatureCollection {
                    found: other.unwrap_or("untyped object").to_string(),
                });
            }
        };

        let geofences = features
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| match Feature::try_from(value) {
                Ok(feature) => geofence_from_feature(idx, feature, schema),
                Err(e) => {
                    log::warn!("Skipping feature {idx}: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        log::info!("Loaded {} geofences", geofences.len());

        Ok(Self::new(geofences))
    }

    /// Converts already-decoded features into geofences.
    ///
    /// Features without a polygon geometry are skipped with a warning.
    /// Features without any identifier property get `ps_{index:03}`.
    #[must_use]
    pub fn from_feature_collection(fc: FeatureCollection, schema: &GeofenceSchema) -> Self {
        let geofences = fc
            .features
            .into_iter()
            .enumerate()
            .filter_map(|(idx, feature)| geofence_from_feature(idx, feature, schema))
            .collect::<Vec<_>>();

        log::info!("Loaded {} geofences", geofences.len());

        Self::new(geofences)
    }
}

fn geofence_from_feature(
    idx: usize,
    feature: Feature,
    schema: &GeofenceSchema,
) -> Option<Geofence<MultiPolygon<f64>>> {
    let properties = feature.properties.unwrap_or_default();
    let id = extract_id(&properties, schema).unwrap_or_else(|| format!("ps_{idx:03}"));

    let Some(geometry) = feature.geometry else {
        log::warn!("Skipping geofence {id}: feature has no geometry");
        return None;
    };

    let boundary = match parse_boundary(geometry) {
        Ok(boundary) => boundary,
        Err(e) => {
            log::warn!("Skipping geofence {id}: {e}");
            return None;
        }
    };

    let safety_score = properties
        .get(&schema.score_property)
        .and_then(serde_json::Value::as_f64);
    let risk_level = extract_risk(&id, &properties, safety_score, schema);

    let mut geofence = Geofence::new(id, boundary, risk_level).with_properties(properties);
    geofence.safety_score = safety_score;
    Some(geofence)
}

fn extract_id(properties: &Properties, schema: &GeofenceSchema) -> Option<String> {
    schema.id_properties.iter().find_map(|key| {
        properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    })
}

/// Reads the risk property.
///
/// Only a missing (or `null`) property falls back to classifying the
/// safety score. A present but unrecognized value stays unknown so the
/// styling and fold defaults apply to it.
fn extract_risk(
    id: &str,
    properties: &Properties,
    safety_score: Option<f64>,
    schema: &GeofenceSchema,
) -> Option<RiskLevel> {
    match properties.get(&schema.risk_property) {
        None | Some(serde_json::Value::Null) => {
            let label = properties
                .get(&schema.label_property)
                .and_then(serde_json::Value::as_str);
            safety_score.map(|score| RiskLevel::from_safety_score(score, label, &schema.thresholds))
        }
        Some(value) => {
            let level = value.as_str().and_then(RiskLevel::parse_lenient);
            if level.is_none() {
                log::warn!("Geofence {id} has unrecognized risk level {value}");
            }
            level
        }
    }
}
