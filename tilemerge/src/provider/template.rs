//! Tile URL templates.

use std::fmt;

use super::types::ProviderError;

const REQUIRED_PLACEHOLDERS: [&str; 3] = ["{z}", "{x}", "{y}"];

/// A `{s}`/`{z}`/`{x}`/`{y}` URL template.
///
/// Placeholders are substituted verbatim. The grid position passed to
/// [`render`](Self::render) must already be wrapped and flipped; the
/// template itself knows nothing about world bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    /// Parse a template with single-character subdomains.
    ///
    /// `"abc"` yields the subdomains `a`, `b` and `c`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidTemplate`] when `{z}`, `{x}` or `{y}`
    /// is missing, or when `{s}` is used without any subdomain.
    pub fn new(template: impl Into<String>, subdomains: &str) -> Result<Self, ProviderError> {
        Self::with_subdomains(template, subdomains.chars().map(String::from).collect())
    }

    /// Parse a template with explicit subdomain names.
    pub fn with_subdomains(
        template: impl Into<String>,
        subdomains: Vec<String>,
    ) -> Result<Self, ProviderError> {
        let template = template.into();

        if let Some(missing) = REQUIRED_PLACEHOLDERS
            .iter()
            .find(|placeholder| !template.contains(*placeholder))
        {
            return Err(ProviderError::InvalidTemplate {
                reason: format!("missing {} placeholder", missing),
                template,
            });
        }
        if template.contains("{s}") && subdomains.is_empty() {
            return Err(ProviderError::InvalidTemplate {
                reason: "{s} placeholder without subdomains".to_string(),
                template,
            });
        }

        Ok(Self {
            template,
            subdomains,
        })
    }

    /// The raw template string.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Configured subdomains.
    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }

    /// Subdomain for a grid position: index `(x + y) mod len`.
    pub fn subdomain(&self, x: i64, y: i64) -> Option<&str> {
        if self.subdomains.is_empty() {
            return None;
        }
        let index = (x + y).rem_euclid(self.subdomains.len() as i64) as usize;
        Some(&self.subdomains[index])
    }

    /// Build the request URL for an adjusted grid position.
    pub fn render(&self, zoom: u8, x: i64, y: i64) -> String {
        let mut url = self
            .template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string());
        if let Some(subdomain) = self.subdomain(x, y) {
            url = url.replace("{s}", subdomain);
        }
        url
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = UrlTemplate::new("https://{s}.t.example/{z}/{x}/{y}.json", "abc").unwrap();

        assert_eq!(template.render(4, 3, 5), "https://c.t.example/4/3/5.json");
        assert_eq!(template.render(4, 0, 0), "https://a.t.example/4/0/0.json");
    }

    #[test]
    fn test_subdomain_rotation() {
        let template = UrlTemplate::new("http://{s}/{z}/{x}/{y}", "ab").unwrap();

        assert_eq!(template.subdomain(0, 0), Some("a"));
        assert_eq!(template.subdomain(1, 0), Some("b"));
        assert_eq!(template.subdomain(1, 1), Some("a"));
        // Negative sums stay in range
        assert_eq!(template.subdomain(-3, 0), Some("b"));
    }

    #[test]
    fn test_template_without_subdomain_placeholder() {
        let template = UrlTemplate::new("http://tiles/{z}/{x}/{y}", "").unwrap();
        assert_eq!(template.render(1, 1, 0), "http://tiles/1/1/0");
        assert_eq!(template.subdomain(1, 0), None);
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        assert!(matches!(
            UrlTemplate::new("http://tiles/{z}/{x}.json", "abc"),
            Err(ProviderError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_subdomain_placeholder_needs_subdomains() {
        let err = UrlTemplate::new("http://{s}/{z}/{x}/{y}", "").unwrap_err();
        assert!(err.to_string().contains("without subdomains"));
    }

    #[test]
    fn test_named_subdomains() {
        let template = UrlTemplate::with_subdomains(
            "http://{s}.example/{z}/{x}/{y}",
            vec!["east".into(), "west".into()],
        )
        .unwrap();
        assert_eq!(template.render(2, 1, 2), "http://west.example/2/1/2");
    }
}
