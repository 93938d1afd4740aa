/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Query filters and pagination for repository reads
//!
//! Filters combine with AND; the values of one filter combine with OR.

use crate::domain::{EntityKind, FilterError, RepositoryError};
use std::collections::BTreeMap;

/// A single predicate over one column
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals any of the values
    In { field: String, values: Vec<String> },
    /// Column equals none of the values
    NotIn { field: String, values: Vec<String> },
    /// Column is strictly below the value; timestamps compare chronologically
    LessThan { field: String, value: String },
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::In { field, .. } | Filter::NotIn { field, .. } | Filter::LessThan { field, .. } => {
                field
            }
        }
    }

    pub fn is_in(field: &str, values: &[&str]) -> Self {
        Filter::In {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn not_in(field: &str, values: &[&str]) -> Self {
        Filter::NotIn {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn less_than(field: &str, value: &str) -> Self {
        Filter::LessThan {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Conjunction of filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(Vec<Filter>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, builder style
    pub fn with(mut self, filter: Filter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.0.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.0.iter()
    }

    /// Build `In` filters (or `NotIn` when `negate` is set) from a `{name: [values]}` map
    pub fn from_map(map: &BTreeMap<String, Vec<String>>, negate: bool) -> Self {
        let filters = map
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| {
                if negate {
                    Filter::NotIn {
                        field: field.clone(),
                        values: values.clone(),
                    }
                } else {
                    Filter::In {
                        field: field.clone(),
                        values: values.clone(),
                    }
                }
            })
            .collect();
        Filters(filters)
    }

    /// Reject filters naming a column the entity does not have
    ///
    /// # Arguments
    /// * `kind` - Entity the filters will run against
    ///
    /// # Returns
    /// * `Ok(())` - Every field is a column of the entity table
    /// * `Err(RepositoryError::UnknownField)` - First unknown field
    pub fn validate(&self, kind: EntityKind) -> Result<(), RepositoryError> {
        let columns = kind.columns();
        for filter in &self.0 {
            if !columns.iter().any(|c| c.name == filter.field()) {
                return Err(RepositoryError::UnknownField {
                    table: kind.table().to_string(),
                    field: filter.field().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Offset pagination window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    /// `None` reads to the end
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }
}

/// Parse query parameters into filters and a page
///
/// Recognized keys:
/// * `filter[name]=a,b` - `In` (or `NotIn` with `negate=true`)
/// * `filter[name][lt]=value` - `LessThan`
/// * `page[offset]` / `offset`, `page[limit]` / `limit`
///
/// `page[size]` and `page[number]` are rejected.
pub fn parse_query(params: &[(String, String)]) -> Result<(Filters, Page), FilterError> {
    let negate = params
        .iter()
        .find(|(k, _)| k == "negate")
        .map(|(_, v)| v == "true" || v == "1")
        .unwrap_or(false);

    let mut matches: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut bounds = Vec::new();
    let mut page = Page::default();

    for (key, value) in params {
        match key.as_str() {
            "page[size]" | "page[number]" => {
                return Err(FilterError::UnsupportedPagination(key.clone()))
            }
            "page[offset]" | "offset" => page.offset = parse_usize(key, value)?,
            "page[limit]" | "limit" => page.limit = Some(parse_usize(key, value)?),
            "negate" => {}
            _ => {
                let Some(inner) = key.strip_prefix("filter[") else {
                    continue;
                };
                if let Some(field) = inner.strip_suffix("][lt]") {
                    bounds.push(Filter::less_than(field, value));
                } else if let Some(field) = inner.strip_suffix(']') {
                    matches.entry(field.to_string()).or_default().extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(str::to_string),
                    );
                } else {
                    return Err(FilterError::InvalidValue {
                        name: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
    }

    let mut filters = Filters::from_map(&matches, negate);
    for bound in bounds {
        filters.push(bound);
    }
    Ok((filters, page))
}

fn parse_usize(name: &str, value: &str) -> Result<usize, FilterError> {
    value.parse().map_err(|_| FilterError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_in_filters_and_page() {
        let (filters, page) = parse_query(&params(&[
            ("filter[vendor]", "HP,Dell"),
            ("filter[status]", "OK"),
            ("page[offset]", "20"),
            ("page[limit]", "10"),
        ]))
        .unwrap();

        let collected: Vec<&Filter> = filters.iter().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0], &Filter::is_in("status", &["OK"]));
        assert_eq!(collected[1], &Filter::is_in("vendor", &["HP", "Dell"]));
        assert_eq!(page, Page::new(20, 10));
    }

    #[test]
    fn test_negate_turns_in_into_not_in() {
        let (filters, _) =
            parse_query(&params(&[("filter[vendor]", "HP"), ("negate", "true")])).unwrap();
        assert_eq!(
            filters.iter().next().unwrap(),
            &Filter::not_in("vendor", &["HP"])
        );
    }

    #[test]
    fn test_less_than_filter() {
        let (filters, _) = parse_query(&params(&[(
            "filter[updated_at][lt]",
            "2024-01-01T00:00:00Z",
        )]))
        .unwrap();
        assert_eq!(
            filters.iter().next().unwrap(),
            &Filter::less_than("updated_at", "2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_page_size_and_number_are_rejected() {
        let err = parse_query(&params(&[("page[size]", "10")])).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedPagination("page[size]".into()));
        assert!(parse_query(&params(&[("page[number]", "2")])).is_err());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let filters = Filters::new().with(Filter::is_in("colour", &["red"]));
        let err = filters.validate(EntityKind::Blade).unwrap_err();
        assert_eq!(
            err,
            RepositoryError::UnknownField {
                table: "blade".into(),
                field: "colour".into()
            }
        );
        assert!(Filters::new()
            .with(Filter::is_in("vendor", &["HP"]))
            .validate(EntityKind::Blade)
            .is_ok());
    }
}
