//! Templates compiled into the binary

use super::{
    TemplateProvider, BACKEND_CONTAINER, BACKEND_CONTAINER_IGNORE, DEV_LAUNCHER,
    FRONTEND_CONTAINER, HOSTING_SHIM,
};
use std::borrow::Cow;

const BUNDLED: &[(&str, &str)] = &[
    (
        "custom-user-module/__init__.py",
        include_str!("../../templates/custom-user-module/__init__.py"),
    ),
    (
        "custom-user-module/admin.py",
        include_str!("../../templates/custom-user-module/admin.py"),
    ),
    (
        "custom-user-module/apps.py",
        include_str!("../../templates/custom-user-module/apps.py"),
    ),
    (
        "custom-user-module/managers.py",
        include_str!("../../templates/custom-user-module/managers.py"),
    ),
    (
        "custom-user-module/models.py",
        include_str!("../../templates/custom-user-module/models.py"),
    ),
    (
        "custom-user-module/migrations/__init__.py",
        include_str!("../../templates/custom-user-module/migrations/__init__.py"),
    ),
    (DEV_LAUNCHER, include_str!("../../templates/dev/dev.sh")),
    (
        BACKEND_CONTAINER,
        include_str!("../../templates/docker/Dockerfile.backend"),
    ),
    (
        FRONTEND_CONTAINER,
        include_str!("../../templates/docker/Dockerfile.frontend"),
    ),
    (
        BACKEND_CONTAINER_IGNORE,
        include_str!("../../templates/docker/dockerignore.backend"),
    ),
    (
        HOSTING_SHIM,
        include_str!("../../templates/hosting/passenger_wsgi.py"),
    ),
];

/// The built-in template set
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledTemplates;

impl TemplateProvider for BundledTemplates {
    fn lookup(&self, key: &str) -> Option<Cow<'_, [u8]>> {
        BUNDLED
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, content)| Cow::Borrowed(content.as_bytes()))
    }

    fn keys(&self) -> Vec<String> {
        BUNDLED.iter().map(|(k, _)| k.to_string()).collect()
    }
}
