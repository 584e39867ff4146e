//! Content negotiation for HTTP requests.
//!
//! Parses `Accept` headers with quality values and selects the best
//! matching media type from a set of available representations.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "html")
    pub subtype: String,
    /// Optional parameters (e.g., charset=utf-8), excluding `q`
    pub params: HashMap<String, String>,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
            params: HashMap::new(),
        }
    }

    /// Create `*/*`.
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type, ignoring any quality parameter.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');
        let type_subtype = parts.next()?.trim();
        let mut type_parts = type_subtype.splitn(2, '/');
        let type_ = type_parts.next()?.trim().to_lowercase();
        let subtype = type_parts.next()?.trim().to_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = HashMap::new();
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                if key != "q" {
                    params.insert(key, value.trim().trim_matches('"').to_string());
                }
            }
        }

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// Check if this media type matches another, considering wildcards.
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// The full MIME type string, without parameters.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    fn specificity(&self) -> u8 {
        let mut score = 0u8;
        if self.type_ != "*" {
            score += 2;
        }
        if self.subtype != "*" {
            score += 1;
        }
        score
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}

/// A parsed `Accept` header with quality values, sorted by preference.
#[derive(Debug, Clone, Default)]
pub struct Accept {
    pub media_types: Vec<(MediaType, f32)>,
}

impl Accept {
    /// An Accept header that accepts anything.
    pub fn new() -> Self {
        Self {
            media_types: vec![(MediaType::any(), 1.0)],
        }
    }

    /// Parse an Accept header string. An empty or unparseable header is
    /// treated as `*/*`.
    pub fn parse(header: &str) -> Self {
        let mut media_types: Vec<(MediaType, f32)> = header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let quality = Self::extract_quality(part);
                MediaType::parse(part).map(|mt| (mt, quality))
            })
            .collect();

        if media_types.is_empty() {
            return Self::new();
        }

        // Highest quality first, ties broken by specificity.
        media_types.sort_by(|a, b| {
            match b.1.partial_cmp(&a.1) {
                Some(Ordering::Equal) | None => {}
                Some(ord) => return ord,
            }
            b.0.specificity().cmp(&a.0.specificity())
        });

        Self { media_types }
    }

    /// Quality value of one Accept entry, defaulting to 1.0. Parameters
    /// are inspected segment by segment so non-ASCII parameter values
    /// never shift the indexing. `MediaType::parse` skips the `q`
    /// parameter itself.
    fn extract_quality(s: &str) -> f32 {
        for param in s.split(';').skip(1) {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    return value
                        .trim()
                        .parse::<f32>()
                        .unwrap_or(1.0)
                        .clamp(0.0, 1.0);
                }
            }
        }
        1.0
    }

    /// Quality value the client assigned to `media_type`; 0.0 when not
    /// acceptable.
    pub fn quality_for(&self, media_type: &MediaType) -> f32 {
        for (mt, quality) in &self.media_types {
            if mt.matches(media_type) {
                return *quality;
            }
        }
        0.0
    }

    /// Check if a media type is acceptable at all.
    pub fn accepts(&self, media_type: &MediaType) -> bool {
        self.quality_for(media_type) > 0.0
    }
}

/// Pick the best media type from `available` for the client preferences
/// in `accept`. Quality wins; specificity breaks ties; earlier entries
/// win remaining ties, so registration order matters.
pub fn negotiate<'a>(accept: &Accept, available: &'a [MediaType]) -> Option<&'a MediaType> {
    let mut best: Option<(&'a MediaType, f32, u8)> = None;

    for candidate in available {
        let quality = accept.quality_for(candidate);
        if quality <= 0.0 {
            continue;
        }
        let specificity = candidate.specificity();
        match &best {
            None => best = Some((candidate, quality, specificity)),
            Some((_, best_q, best_s)) => {
                if quality > *best_q || (quality == *best_q && specificity > *best_s) {
                    best = Some((candidate, quality, specificity));
                }
            }
        }
    }

    best.map(|(mt, _, _)| mt)
}
