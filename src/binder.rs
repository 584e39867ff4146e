//! Argument binder: turns a request plus URL variables into the argument
//! set a resource method was declared to take.
//!
//! The binding source depends on the request method: query parameters
//! for GET, DELETE, and HEAD; the decoded form body for everything else.
//! URL variables always win over source values for named parameters.

use std::collections::HashMap;

use crate::error::Error;
use crate::http::HttpRequest;
use crate::resource::{ParamKind, Resource};

/// Bound arguments, ready to hand to a resource method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args {
    /// Call with no arguments.
    Empty,
    /// Positional values collected by a var-positional parameter.
    Positional(Vec<String>),
    /// Named values collected for declared parameters.
    Keyword(HashMap<String, String>),
}

impl Args {
    /// Look up a keyword argument. `None` for the other variants.
    pub fn keyword(&self, name: &str) -> Option<&str> {
        match self {
            Args::Keyword(map) => map.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// The positional values, empty for the other variants.
    pub fn positional(&self) -> &[String] {
        match self {
            Args::Positional(values) => values,
            _ => &[],
        }
    }
}

/// Bind request data to the parameters `resource` declared for
/// `method`. Every failure is a [`Error::Bind`], which the boundary
/// turns into a 400.
pub fn bind(
    resource: &dyn Resource,
    method: &str,
    request: &HttpRequest,
    urlvars: &HashMap<String, String>,
) -> Result<Args, Error> {
    let descriptor = resource
        .describe(method)
        .ok_or_else(|| Error::Bind(format!("resource has no method {method}")))?;

    let source: &[(String, String)] =
        if matches!(request.method.as_str(), "GET" | "DELETE" | "HEAD") {
            &request.query
        } else {
            &request.form
        };

    let mut positional: Vec<String> = Vec::new();
    let mut keyword: HashMap<String, String> = HashMap::new();

    for param in &descriptor.params {
        match param.kind {
            ParamKind::VarPositional => {
                positional.extend(
                    source
                        .iter()
                        .filter(|(k, _)| *k == param.name)
                        .map(|(_, v)| v.clone()),
                );
            }
            ParamKind::VarKeyword => {
                for (k, v) in source {
                    keyword.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            ParamKind::Required | ParamKind::Optional => {
                let value = urlvars
                    .get(&param.name)
                    .map(String::as_str)
                    .or_else(|| {
                        source
                            .iter()
                            .find(|(k, _)| *k == param.name)
                            .map(|(_, v)| v.as_str())
                    });
                match value {
                    Some(value) => {
                        keyword.insert(param.name.clone(), value.to_string());
                    }
                    None if param.kind == ParamKind::Required => {
                        return Err(Error::Bind(format!(
                            "missing required parameter {} for {method}",
                            param.name
                        )));
                    }
                    None => {}
                }
            }
        }
    }

    match (positional.is_empty(), keyword.is_empty()) {
        (true, true) => Ok(Args::Empty),
        (false, true) => Ok(Args::Positional(positional)),
        (true, false) => Ok(Args::Keyword(keyword)),
        (false, false) => Err(Error::Bind(format!(
            "method {method} mixes positional and keyword arguments"
        ))),
    }
}
