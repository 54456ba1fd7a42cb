//! Sanitization seam. Generated article HTML is untrusted and must pass
//! through a sanitizer before it is published for rendering; the real
//! implementation is an external collaborator injected at construction.

/// Strip unsafe executable content from HTML. Pure: same input, same
/// output.
pub trait Sanitize: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Pass-through sanitizer for trusted or development content. Deployments
/// rendering third-party HTML must inject a real implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentitySanitizer;

impl Sanitize for IdentitySanitizer {
    fn sanitize(&self, html: &str) -> String {
        html.to_string()
    }
}
