// Mounted resources: path patterns, matching, and URL generation

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::error::Error;
use crate::resource::ResourceFactory;

/// One segment of a parsed path pattern.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    /// `{name}` or `{name:regex}` placeholder.
    Var(String),
}

/// A resource mounted at a path pattern.
///
/// Patterns are compiled at mount time; a pattern that fails to compile
/// is a configuration error, surfaced before the application ever serves
/// a request. Placeholders take two forms: `{name}` matches one or more
/// word or hyphen characters, `{name:regex}` matches the supplied regex.
/// The compiled pattern is anchored against the entire path.
pub struct MountedResource {
    name: String,
    factory: ResourceFactory,
    path: String,
    pattern: Regex,
    segments: Vec<Segment>,
    methods: HashSet<String>,
    dispatch_method: Option<String>,
    add_slash: bool,
}

/// Transient result of a successful lookup.
#[derive(Clone)]
pub struct Match {
    pub name: String,
    pub path: String,
    pub urlvars: HashMap<String, String>,
    pub factory: ResourceFactory,
    pub dispatch_method: Option<String>,
    pub add_slash: bool,
}

impl MountedResource {
    pub fn new(
        name: impl Into<String>,
        factory: ResourceFactory,
        path: impl Into<String>,
        methods: impl IntoIterator<Item = String>,
        dispatch_method: Option<String>,
        add_slash: bool,
    ) -> Result<Self, Error> {
        let name = name.into();
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        let segments = parse_segments(&name, &path)?;
        let pattern = compile_pattern(&name, &path, &segments)?;
        Ok(Self {
            name,
            factory,
            path,
            pattern,
            segments,
            methods: methods.into_iter().collect(),
            dispatch_method,
            add_slash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &HashSet<String> {
        &self.methods
    }

    pub fn dispatch_method(&self) -> Option<&str> {
        self.dispatch_method.as_deref()
    }

    pub fn add_slash(&self) -> bool {
        self.add_slash
    }

    pub fn factory(&self) -> &ResourceFactory {
        &self.factory
    }

    /// Does the method set accept this method? An empty set accepts any.
    pub fn allows(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Match the path only, ignoring methods.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.pattern.captures(path)?;
        let mut urlvars = HashMap::new();
        for name in self.pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                urlvars.insert(name.to_string(), value.as_str().to_string());
            }
        }
        Some(urlvars)
    }

    /// Match both the method and the path.
    pub fn matches(&self, method: &str, path: &str) -> Option<Match> {
        if !self.allows(method) {
            return None;
        }
        let urlvars = self.match_path(path)?;
        Some(Match {
            name: self.name.clone(),
            path: self.path.clone(),
            urlvars,
            factory: self.factory.clone(),
            dispatch_method: self.dispatch_method.clone(),
            add_slash: self.add_slash,
        })
    }

    /// Substitute variables into the pattern to generate a concrete path.
    /// The generated path must re-match the pattern, which guards against
    /// variable values containing characters invalid for their slot.
    pub fn format_path(&self, vars: &HashMap<String, String>) -> Result<String, Error> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Var(name) => {
                    let value = vars.get(name).ok_or_else(|| {
                        Error::PathFormat(format!(
                            "missing variable {name} for resource {}",
                            self.name
                        ))
                    })?;
                    path.push_str(value);
                }
            }
        }
        if !self.pattern.is_match(&path) {
            return Err(Error::PathFormat(format!(
                "substitutions {vars:?} produce a path that does not match {}",
                self.path
            )));
        }
        Ok(path)
    }
}

/// Split a pattern into literal and placeholder segments. A placeholder
/// body runs to its matching close brace, so `{id:\d{2}}` nests.
fn parse_segments(name: &str, path: &str) -> Result<Vec<Segment>, Error> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            literal.push(c);
            continue;
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        let mut body = String::new();
        let mut depth = 1usize;
        for inner in chars.by_ref() {
            match inner {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            body.push(inner);
        }
        if depth != 0 {
            return Err(Error::Configuration(format!(
                "unbalanced braces in path pattern {path} for resource {name}"
            )));
        }
        let var_name = body.split(':').next().unwrap_or("").to_string();
        if var_name.is_empty() || !var_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(Error::Configuration(format!(
                "invalid placeholder {{{body}}} in path pattern {path} for resource {name}"
            )));
        }
        segments.push(Segment::Var(var_name));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn compile_pattern(name: &str, path: &str, segments: &[Segment]) -> Result<Regex, Error> {
    // Rebuild the regex from the same scan the segment parser did, so
    // the custom sub-regex of {var:regex} placeholders is preserved.
    let mut regex = String::from("^");
    let mut chars = path.chars().peekable();
    let mut var_index = 0usize;

    while let Some(c) = chars.next() {
        if c != '{' {
            let mut literal = String::from(c);
            while let Some(&next) = chars.peek() {
                if next == '{' {
                    break;
                }
                literal.push(next);
                chars.next();
            }
            regex.push_str(&regex::escape(&literal));
            continue;
        }
        let mut body = String::new();
        let mut depth = 1usize;
        for inner in chars.by_ref() {
            match inner {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            body.push(inner);
        }
        let var_name = match segments
            .iter()
            .filter_map(|s| match s {
                Segment::Var(n) => Some(n),
                Segment::Literal(_) => None,
            })
            .nth(var_index)
        {
            Some(n) => n,
            None => continue,
        };
        var_index += 1;
        match body.split_once(':') {
            Some((_, sub_regex)) => {
                regex.push_str(&format!("(?P<{var_name}>{sub_regex})"));
            }
            None => {
                regex.push_str(&format!(r"(?P<{var_name}>[\w-]+)"));
            }
        }
    }
    regex.push('$');

    Regex::new(&regex).map_err(|err| {
        Error::Configuration(format!(
            "path pattern {path} for resource {name} failed to compile: {err}"
        ))
    })
}

/// Join a subresource path under its parent's path.
pub fn join_paths(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    format!("{parent}/{child}")
}
