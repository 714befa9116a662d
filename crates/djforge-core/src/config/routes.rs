//! Patch set for `config/urls.py`

use super::patch::{Anchor, Patch, PatchSet};
use crate::features::{Feature, FeatureSelection};

/// Mount point of the Ninja API
pub const API_PREFIX: &str = "api/";

/// Token endpoint added by the REST framework feature
pub const TOKEN_PATH: &str = "api-token-auth/";

/// Build the route patches for `selection`; empty when no feature adds routes
pub fn routes_patches(selection: &FeatureSelection) -> PatchSet {
    let mut imports = String::new();
    let mut routes = String::new();

    if selection.has(Feature::ApiRouter) {
        imports.push_str("from ninja import NinjaAPI\n");
        routes.push_str(&format!("    path('{}', api.urls),\n", API_PREFIX));
    }
    if selection.has(Feature::AuthToken) {
        imports.push_str("from rest_framework.authtoken import views as authtoken_views\n");
        routes.push_str(&format!(
            "    path('{}', authtoken_views.obtain_auth_token),\n",
            TOKEN_PATH
        ));
    }
    if imports.is_empty() {
        return PatchSet::new();
    }
    if selection.has(Feature::ApiRouter) {
        imports.push_str("\napi = NinjaAPI()\n");
    }

    let mut patches = PatchSet::new();
    patches.push(Patch::insert_after(
        "route-imports",
        Anchor::pattern(r"(?m)^from django\.urls import (?:include, )?path\n"),
        format!("\n{}", imports),
    ));
    patches.push(Patch::insert_after(
        "route-patterns",
        Anchor::pattern(r#"(?m)^    path\(['"]admin/['"], admin\.site\.urls\),\n"#),
        routes,
    ));
    patches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::patch;
    use crate::features::FeatureSelector;

    const URLS: &str = include_str!("../../tests/fixtures/urls.py");

    fn patched(features: &[Feature]) -> String {
        let extras: &[&str] = &[];
        let selection = FeatureSelector::default().select(features, extras).unwrap();
        patch::apply(URLS, &routes_patches(&selection)).unwrap()
    }

    #[test]
    fn test_api_router_is_mounted() {
        let out = patched(&[Feature::ApiRouter]);
        assert!(out.contains(
            "from django.urls import path\n\nfrom ninja import NinjaAPI\n\napi = NinjaAPI()\n\nurlpatterns = [\n"
        ));
        assert!(out.contains(
            "    path('admin/', admin.site.urls),\n    path('api/', api.urls),\n]\n"
        ));
    }

    #[test]
    fn test_token_endpoint() {
        let out = patched(&[Feature::AuthToken, Feature::ApiRouter]);
        assert!(out.contains("from rest_framework.authtoken import views as authtoken_views\n"));
        assert!(out.contains(
            "    path('api/', api.urls),\n    path('api-token-auth/', authtoken_views.obtain_auth_token),\n"
        ));
    }

    #[test]
    fn test_no_route_features_leaves_file_alone() {
        assert_eq!(patched(&[Feature::CrossOrigin, Feature::Postgres]), URLS);
    }

    #[test]
    fn test_routes_apply_once() {
        let extras: &[&str] = &[];
        let selection = FeatureSelector::default()
            .select(&Feature::ALL, extras)
            .unwrap();
        let patches = routes_patches(&selection);
        patch::validate(&patches).unwrap();
        let once = patch::apply(URLS, &patches).unwrap();
        assert_eq!(patch::apply(&once, &patches).unwrap(), once);
        assert_eq!(once.matches("api.urls").count(), 1);
    }
}
