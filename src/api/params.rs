//! Query parameter and search body parsing
//!
//! GET parameters arrive as strings; the POST search body is structured.
//! Both funnel into the same [`ItemFilter`], and both reject rather than
//! repair malformed input.

use crate::error::{Error, Result};
use crate::store::query::{ItemFilter, DEFAULT_LIMIT};
use serde::Deserialize;
use std::collections::HashMap;

/// GET parameters for item listing and search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub collections: Option<String>,
    pub bbox: Option<String>,
    pub limit: Option<u32>,
    pub year: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
}

impl SearchParams {
    /// Convert to a validated filter. `fixed_collection` pins the filter to
    /// one collection for the nested items route.
    pub fn into_filter(self, fixed_collection: Option<&str>) -> Result<ItemFilter> {
        let collections = match fixed_collection {
            Some(id) => vec![id.to_string()],
            None => self
                .collections
                .as_deref()
                .map(split_csv)
                .unwrap_or_default(),
        };
        let filter = ItemFilter {
            collections,
            year: self.year,
            region: self.region,
            zone: self.zone,
            bbox: self.bbox.as_deref().map(parse_bbox).transpose()?,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        };
        filter.validate()?;
        Ok(filter)
    }
}

/// One field constraint in the POST search body; only `eq` is supported.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldQuery {
    pub eq: Option<serde_json::Value>,
}

/// POST /search body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchBody {
    pub collections: Option<Vec<String>>,
    pub bbox: Option<Vec<f64>>,
    pub limit: Option<u32>,
    pub query: Option<HashMap<String, FieldQuery>>,
}

impl SearchBody {
    pub fn into_filter(self) -> Result<ItemFilter> {
        let bbox = match self.bbox {
            Some(values) => Some(bbox_from_values(&values)?),
            None => None,
        };

        let mut filter = ItemFilter {
            collections: self.collections.unwrap_or_default(),
            bbox,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            ..ItemFilter::default()
        };

        for (field, constraint) in self.query.unwrap_or_default() {
            let Some(value) = constraint.eq else {
                continue;
            };
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::InvalidQuery(format!(
                        "unsupported value for query field '{field}': {other}"
                    )))
                }
            };
            match field.as_str() {
                "year" => filter.year = Some(text),
                "region" => filter.region = Some(text),
                "zone" => filter.zone = Some(text),
                _ => {
                    return Err(Error::InvalidQuery(format!(
                        "unknown query field '{field}'"
                    )))
                }
            }
        }

        filter.validate()?;
        Ok(filter)
    }
}

/// Parse a `minX,minY,maxX,maxY` bbox parameter.
pub fn parse_bbox(raw: &str) -> Result<[f64; 4]> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(Error::InvalidQuery(format!(
            "bbox must have 4 comma-separated values, got {}",
            parts.len()
        )));
    }
    let mut values = [0.0f64; 4];
    for (i, part) in parts.iter().enumerate() {
        values[i] = part
            .parse()
            .map_err(|_| Error::InvalidQuery(format!("bbox value '{part}' is not a number")))?;
    }
    Ok(values)
}

fn bbox_from_values(values: &[f64]) -> Result<[f64; 4]> {
    values.try_into().map_err(|_| {
        Error::InvalidQuery(format!(
            "bbox must have 4 values, got {}",
            values.len()
        ))
    })
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox_valid() {
        assert_eq!(
            parse_bbox("-10.5, 40, 12.25, 55.5").unwrap(),
            [-10.5, 40.0, 12.25, 55.5]
        );
    }

    #[test]
    fn test_parse_bbox_malformed() {
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,3,x").is_err());
        assert!(parse_bbox("").is_err());
    }

    #[test]
    fn test_get_params_to_filter() {
        let params = SearchParams {
            collections: Some("dem, ortho".to_string()),
            bbox: Some("5,44,15,48".to_string()),
            limit: Some(10),
            year: Some("2021".to_string()),
            region: None,
            zone: None,
        };
        let filter = params.into_filter(None).unwrap();
        assert_eq!(filter.collections, vec!["dem", "ortho"]);
        assert_eq!(filter.bbox, Some([5.0, 44.0, 15.0, 48.0]));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.year.as_deref(), Some("2021"));
    }

    #[test]
    fn test_fixed_collection_wins() {
        let params = SearchParams {
            collections: Some("other".to_string()),
            ..Default::default()
        };
        let filter = params.into_filter(Some("dem")).unwrap();
        assert_eq!(filter.collections, vec!["dem"]);
    }

    #[test]
    fn test_get_params_default_limit() {
        let filter = SearchParams::default().into_filter(None).unwrap();
        assert_eq!(filter.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_get_params_limit_out_of_range() {
        let params = SearchParams {
            limit: Some(5000),
            ..Default::default()
        };
        assert!(params.into_filter(None).is_err());
    }

    #[test]
    fn test_search_body_field_queries() {
        let body: SearchBody = serde_json::from_str(
            r#"{
                "collections": ["dem"],
                "bbox": [5.0, 44.0, 15.0, 48.0],
                "limit": 25,
                "query": {"year": {"eq": 2021}, "zone": {"eq": "33N"}}
            }"#,
        )
        .unwrap();
        let filter = body.into_filter().unwrap();
        assert_eq!(filter.year.as_deref(), Some("2021"));
        assert_eq!(filter.zone.as_deref(), Some("33N"));
        assert_eq!(filter.limit, 25);
    }

    #[test]
    fn test_search_body_unknown_field_rejected() {
        let body: SearchBody = serde_json::from_str(
            r#"{"query": {"altitude": {"eq": 5}}}"#,
        )
        .unwrap();
        assert!(body.into_filter().is_err());
    }

    #[test]
    fn test_search_body_short_bbox_rejected() {
        let body: SearchBody =
            serde_json::from_str(r#"{"bbox": [1.0, 2.0, 3.0]}"#).unwrap();
        assert!(body.into_filter().is_err());
    }

    #[test]
    fn test_search_body_unknown_operator_rejected() {
        let parsed: std::result::Result<SearchBody, _> =
            serde_json::from_str(r#"{"query": {"year": {"gt": 2000}}}"#);
        assert!(parsed.is_err());
    }
}
