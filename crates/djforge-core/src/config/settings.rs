//! Patch set for `config/settings.py`
//!
//! Anchors target the file written by `django-admin startproject` and accept
//! either quote style, so a project reformatted with black still patches.

use super::patch::{Anchor, Patch, PatchSet};
use crate::features::{Feature, FeatureSelection};

pub const DEFAULT_LANGUAGE_CODE: &str = "pl-PL";
pub const DEFAULT_TIME_ZONE: &str = "Europe/Warsaw";

pub const CORS_MIDDLEWARE: &str = "corsheaders.middleware.CorsMiddleware";
pub const AUTH_USER_MODEL: &str = "users.User";

/// Values written into the settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsOptions {
    pub language_code: String,
    pub time_zone: String,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

/// Quote a value as a single-quoted Python string literal
fn py_str(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn installed_apps(selection: &FeatureSelection) -> Vec<&'static str> {
    let mut apps = Vec::new();
    if selection.has(Feature::CustomUserModel) {
        apps.push("users");
    }
    if selection.has(Feature::AuthToken) {
        apps.push("rest_framework");
        apps.push("rest_framework.authtoken");
    }
    if selection.has(Feature::CrossOrigin) {
        apps.push("corsheaders");
    }
    apps
}

/// Extra top-level settings placed right before `ROOT_URLCONF`
fn project_settings(selection: &FeatureSelection) -> String {
    let mut block = String::new();
    if selection.has(Feature::CrossOrigin) {
        block.push_str("CORS_ALLOW_ALL_ORIGINS = True\n\n");
    }
    if selection.has(Feature::AuthToken) {
        block.push_str(
            "REST_FRAMEWORK = {\n\
             \x20   'DEFAULT_AUTHENTICATION_CLASSES': [\n\
             \x20       'rest_framework.authentication.TokenAuthentication',\n\
             \x20       'rest_framework.authentication.SessionAuthentication',\n\
             \x20   ],\n\
             }\n\n",
        );
    }
    block
}

const POSTGRES_DATABASES: &str = "\
DATABASES = {
    'default': {
        'ENGINE': 'django.db.backends.postgresql',
        'NAME': config('DB_NAME'),
        'USER': config('DB_USER'),
        'PASSWORD': config('DB_PASSWORD'),
        'HOST': config('DB_HOST', default='localhost'),
        'PORT': config('DB_PORT', default='5432'),
    }
}
";

/// Entries added to `.env` next to the patched settings
pub fn env_entries(selection: &FeatureSelection, secret_key: &str) -> Vec<(String, String)> {
    let mut entries = vec![
        ("SECRET_KEY".to_string(), secret_key.to_string()),
        ("DEBUG".to_string(), "True".to_string()),
    ];
    if selection.has(Feature::Postgres) {
        for (key, value) in [
            ("DB_NAME", "<db_name>"),
            ("DB_USER", "<db_username>"),
            ("DB_PASSWORD", "<password>"),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5432"),
        ] {
            entries.push((key.to_string(), value.to_string()));
        }
    }
    entries
}

/// Build the ordered settings patches for `selection`
pub fn settings_patches(selection: &FeatureSelection, options: &SettingsOptions) -> PatchSet {
    let mut patches = PatchSet::new();

    let pathlib = r"(?m)^from pathlib import Path\n";
    patches.push(Patch::insert_before(
        "import-os",
        Anchor::pattern(pathlib),
        "import os\n",
    ));
    patches.push(Patch::insert_after(
        "import-decouple",
        Anchor::pattern(pathlib),
        "\nfrom decouple import config\n",
    ));

    patches.push(Patch::replace_line(
        "secret-key",
        Anchor::pattern(r#"(?m)^SECRET_KEY = ['"].*['"]$"#),
        "SECRET_KEY = config('SECRET_KEY')",
    ));
    patches.push(Patch::replace_line(
        "debug",
        Anchor::pattern(r"(?m)^DEBUG = True$"),
        "DEBUG = config('DEBUG', default=False, cast=bool)",
    ));
    patches.push(Patch::replace_line(
        "allowed-hosts",
        Anchor::pattern(r"(?m)^ALLOWED_HOSTS = \[\]$"),
        "ALLOWED_HOSTS = ['*']",
    ));

    let apps = installed_apps(selection);
    if !apps.is_empty() {
        let payload: String = apps
            .iter()
            .map(|app| format!("    {},\n", py_str(app)))
            .collect();
        patches.push(Patch::insert_after(
            "installed-apps",
            Anchor::pattern(r#"(?m)^    ['"]django\.contrib\.staticfiles['"],\n"#),
            payload,
        ));
    }

    let middleware = r"(?m)^MIDDLEWARE = \[\n";
    if selection.has(Feature::CustomUserModel) {
        patches.push(Patch::insert_before(
            "auth-user-model",
            Anchor::pattern(middleware),
            format!("AUTH_USER_MODEL = {}\n\n", py_str(AUTH_USER_MODEL)),
        ));
    }
    if selection.has(Feature::CrossOrigin) {
        patches.push(Patch::insert_after(
            "cors-middleware",
            Anchor::pattern(middleware),
            format!("    {},\n", py_str(CORS_MIDDLEWARE)),
        ));
    }

    let extra = project_settings(selection);
    if !extra.is_empty() {
        patches.push(Patch::insert_before(
            "project-settings",
            Anchor::pattern(r"(?m)^ROOT_URLCONF = "),
            extra,
        ));
    }

    if selection.has(Feature::Postgres) {
        patches.push(Patch::replace_block(
            "databases",
            Anchor::pattern(r"(?m)^DATABASES = \{\n"),
            Anchor::pattern(r"(?m)^\}\n"),
            POSTGRES_DATABASES,
        ));
    }

    patches.push(Patch::replace_line(
        "language-code",
        Anchor::pattern(r"(?m)^LANGUAGE_CODE = .*$"),
        format!("LANGUAGE_CODE = {}", py_str(&options.language_code)),
    ));
    patches.push(Patch::replace_line(
        "time-zone",
        Anchor::pattern(r"(?m)^TIME_ZONE = .*$"),
        format!("TIME_ZONE = {}", py_str(&options.time_zone)),
    ));

    patches.push(Patch::insert_after(
        "static-media",
        Anchor::pattern(r#"(?m)^STATIC_URL = ['"]/?static/['"]\n"#),
        format!(
            "MEDIA_URL = 'media/'\n{}\n{}\n",
            public_path_line("STATIC_ROOT", "public", "static"),
            public_path_line("MEDIA_ROOT", "public", "media"),
        ),
    ));

    patches
}

fn public_path_line(setting: &str, public_dir: &str, leaf: &str) -> String {
    format!(
        "{} = os.path.join(BASE_DIR, {}, {})",
        setting,
        py_str(public_dir),
        py_str(leaf)
    )
}

/// Point `STATIC_ROOT` and `MEDIA_ROOT` at `public_dir` under the project
pub fn public_root_patches(public_dir: &str) -> PatchSet {
    [("STATIC_ROOT", "static"), ("MEDIA_ROOT", "media")]
        .into_iter()
        .map(|(setting, leaf)| {
            Patch::replace_line(
                &setting.to_lowercase(),
                Anchor::pattern(format!(r"(?m)^{} = .*$", setting)),
                public_path_line(setting, public_dir, leaf),
            )
        })
        .collect()
}
