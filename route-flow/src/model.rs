//! Typed records exchanged with the recommendation gateway.
//!
//! Payloads are decoded and checked once, here, so that the rest of the crate
//! never sees a half-formed result.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::error::GatewayError;
use crate::map::LatLng;

/// Display payload describing the trip as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripMetadata {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub group_name: String,
}

/// Which preference list of a persona an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Like,
    Dislike,
}

impl std::str::FromStr for PreferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" | "likes" => Ok(Self::Like),
            "dislike" | "dislikes" => Ok(Self::Dislike),
            other => Err(format!("unknown preference kind: {other}")),
        }
    }
}

/// A modeled participant and the tags used to bias recommendations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    /// One-sentence summary of the participant, when the analysis produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<String>,
}

impl Persona {
    pub fn preferences(&self, kind: PreferenceKind) -> &[String] {
        match kind {
            PreferenceKind::Like => &self.likes,
            PreferenceKind::Dislike => &self.dislikes,
        }
    }

    pub(crate) fn preferences_mut(&mut self, kind: PreferenceKind) -> &mut Vec<String> {
        match kind {
            PreferenceKind::Like => &mut self.likes,
            PreferenceKind::Dislike => &mut self.dislikes,
        }
    }
}

/// One ordered stop of a course. `final_query` is the literal search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStep {
    pub step: u32,
    pub category: String,
    pub final_query: String,
}

/// The analysis half of a recommendation: what the file was understood to say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSession {
    #[serde(default)]
    pub metadata: TripMetadata,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub courses: Vec<CourseStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// The query that surfaced this place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_keyword: Option<String>,
}

impl Place {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// One complete alternative itinerary. `places` is in visit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub course_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub analysis: AnalysisSession,
    pub routes: Vec<Route>,
}

impl RecommendationResult {
    /// Decode a gateway response body and check it.
    pub fn from_slice(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: Self = serde_json::from_slice(body)
            .map_err(|e| GatewayError::Malformed(format!("could not decode response: {e}")))?;
        raw.validated()
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, GatewayError> {
        let raw: Self = serde_json::from_value(value)
            .map_err(|e| GatewayError::Malformed(format!("could not decode response: {e}")))?;
        raw.validated()
    }

    /// Enforce the invariants the flow relies on and normalize recoverable noise.
    ///
    /// Rejects results without routes, with repeated `course_id`s, or with a
    /// course step below 1. Blank preference tags and empty links are dropped.
    pub fn validated(mut self) -> Result<Self, GatewayError> {
        if self.routes.is_empty() {
            return Err(GatewayError::Malformed(
                "recommendation contained no routes".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.course_id.as_str()) {
                return Err(GatewayError::Malformed(format!(
                    "duplicate course_id: {}",
                    route.course_id
                )));
            }
        }

        if let Some(course) = self.analysis.courses.iter().find(|c| c.step < 1) {
            return Err(GatewayError::Malformed(format!(
                "course step must be at least 1, got {} for {}",
                course.step, course.category
            )));
        }

        for persona in &mut self.analysis.personas {
            for kind in [PreferenceKind::Like, PreferenceKind::Dislike] {
                let dropped = {
                    let tags = persona.preferences_mut(kind);
                    let before = tags.len();
                    tags.retain(|tag| !tag.trim().is_empty());
                    before - tags.len()
                };
                if dropped > 0 {
                    warn!(
                        persona = %persona.name,
                        dropped,
                        "Dropped blank preference tags from gateway response"
                    );
                }
            }
        }

        for place in self.routes.iter_mut().flat_map(|r| r.places.iter_mut()) {
            if place.link.as_deref().is_some_and(|link| link.trim().is_empty()) {
                place.link = None;
            }
        }

        Ok(self)
    }

    pub fn route(&self, course_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.course_id == course_id)
    }
}
