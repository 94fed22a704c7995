//! Deterministic resource names and path joining.
//!
//! Every name here is a pure function of its inputs, so recompiling an
//! unchanged API reproduces the same identifiers and replaces resources in
//! place instead of duplicating them.

use sha2::{Digest, Sha256};

use crate::domain::{EndpointKind, HttpMethod};

/// Lower-case, underscore-separated form of an arbitrary identifier
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_separator = true;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            out.push('_');
            last_was_separator = true;
        }
    }

    while out.ends_with('_') {
        out.pop();
    }

    if out.is_empty() {
        out.push_str("api");
    }

    out
}

/// Eight hex characters of the SHA-256 digest of `input`
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// `{name}_{version}` prefix shared by all resources of one API
pub fn api_key(name: &str, version: &str) -> String {
    format!("{}_{}", sanitize(name), sanitize(version))
}

/// Cluster name for an API-level endpoint set
pub fn cluster_name(name: &str, version: &str, kind: EndpointKind) -> String {
    format!("cluster_{}_{}", kind.as_str(), api_key(name, version))
}

/// Cluster name for an operation-level endpoint override
pub fn override_cluster_name(
    name: &str,
    version: &str,
    kind: EndpointKind,
    method: HttpMethod,
    path_template: &str,
) -> String {
    format!(
        "{}_{}_{}",
        cluster_name(name, version, kind),
        method.as_str().to_ascii_lowercase(),
        short_hash(path_template)
    )
}

pub fn route_name(name: &str, version: &str, method: HttpMethod, path_template: &str) -> String {
    format!(
        "{}_{}_{}",
        api_key(name, version),
        method.as_str().to_ascii_lowercase(),
        short_hash(path_template)
    )
}

/// Join two path fragments with exactly one slash between segments
pub fn join_paths(prefix: &str, suffix: &str) -> String {
    let segments: Vec<&str> = prefix
        .split('/')
        .chain(suffix.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Split a resource path into the part below `base_path`.
///
/// Documents commonly spell the base path inside their path keys; such a
/// path is not prefixed a second time.
pub fn relative_to_base<'a>(base_path: &str, resource_path: &'a str) -> &'a str {
    if base_path == "/" {
        return resource_path;
    }

    match resource_path.strip_prefix(base_path) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => resource_path,
    }
}

/// Rewrite path-template variable names to the `[A-Za-z0-9_]` form the proxy accepts
pub fn normalize_template(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_variable = false;

    for c in path.chars() {
        match c {
            '{' => {
                in_variable = true;
                out.push(c);
            }
            '}' => {
                in_variable = false;
                out.push(c);
            }
            c if in_variable && !(c.is_ascii_alphanumeric() || c == '_') => out.push('_'),
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize("pets"), "pets");
        assert_eq!(sanitize("Pet Store API"), "pet_store_api");
        assert_eq!(sanitize("1.0.0"), "1_0_0");
        assert_eq!(sanitize("--v1--"), "v1");
        assert_eq!(sanitize("***"), "api");
    }

    #[test]
    fn cluster_names_are_deterministic() {
        assert_eq!(
            cluster_name("pets", "v1", EndpointKind::Production),
            "cluster_production_pets_v1"
        );
        assert_eq!(cluster_name("Pets", "V1", EndpointKind::Sandbox), "cluster_sandbox_pets_v1");

        let a = override_cluster_name("pets", "v1", EndpointKind::Production, HttpMethod::Get, "/p");
        let b = override_cluster_name("pets", "v1", EndpointKind::Production, HttpMethod::Get, "/p");
        let c = override_cluster_name("pets", "v1", EndpointKind::Production, HttpMethod::Put, "/p");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("cluster_production_pets_v1_get_"));
    }

    #[test]
    fn path_joining() {
        assert_eq!(join_paths("/", "/pets/{id}"), "/pets/{id}");
        assert_eq!(join_paths("/api/", "pets"), "/api/pets");
        assert_eq!(join_paths("/api", "/"), "/api");
        assert_eq!(join_paths("", ""), "/");
    }

    #[test]
    fn base_path_is_not_repeated() {
        assert_eq!(relative_to_base("/pets", "/pets/{id}"), "/{id}");
        assert_eq!(relative_to_base("/pets", "/pets"), "/");
        assert_eq!(relative_to_base("/pets", "/petsfood"), "/petsfood");
        assert_eq!(relative_to_base("/", "/pets"), "/pets");
    }

    #[test]
    fn template_variables_normalized() {
        assert_eq!(normalize_template("/pets/{pet-id}/toys/{toy.id}"), "/pets/{pet_id}/toys/{toy_id}");
        assert_eq!(normalize_template("/plain-path"), "/plain-path");
    }
}
