//! Breadcrumb links between dashboards.

use crate::report::template::TemplateRegistry;
use serde::Serialize;

/// One navigation entry of a dashboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub title: String,
    /// Path relative to the dashboard directory.
    pub href: String,
    /// Set on the entry of the page being rendered; shown as plain text.
    pub active: bool,
}

/// Builds breadcrumbs for every registry template, in registry order.
///
/// Every page embeds the same set; only `active` differs.
pub fn build_breadcrumbs(registry: &TemplateRegistry, current: &str) -> Vec<Breadcrumb> {
    registry
        .iter()
        .map(|template| Breadcrumb {
            title: template.title.clone(),
            href: template.file_name(),
            active: template.name == current,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::build_breadcrumbs;
    use crate::report::template::TemplateRegistry;

    #[test]
    fn exactly_current_entry_is_active() {
        let registry = TemplateRegistry::builtin();
        let crumbs = build_breadcrumbs(&registry, "deep_sleep");

        assert_eq!(crumbs.len(), registry.len());
        let active: Vec<&str> = crumbs
            .iter()
            .filter(|crumb| crumb.active)
            .map(|crumb| crumb.href.as_str())
            .collect();
        assert_eq!(active, vec!["deep_sleep_dashboard.html"]);
    }

    #[test]
    fn links_are_identical_across_pages() {
        let registry = TemplateRegistry::builtin();
        let strip = |current: &str| {
            build_breadcrumbs(&registry, current)
                .into_iter()
                .map(|crumb| (crumb.title, crumb.href))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip("overview"), strip("recovery"));
        assert_eq!(strip("overview")[0].1, "overview_dashboard.html");
    }
}
