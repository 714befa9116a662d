//! Feature selection and package resolution

use crate::error::UserInputError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Packages installed into every generated project, in install order
pub const CORE_PACKAGES: &[&str] = &["django", "python-decouple"];

/// Optional capabilities of a generated project
///
/// Declaration order matters: it drives the package order and the order in
/// which the interactive prompt asks about each feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    ApiRouter,
    AuthToken,
    CrossOrigin,
    CustomUserModel,
    Postgres,
    Frontend,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::ApiRouter,
        Feature::AuthToken,
        Feature::CrossOrigin,
        Feature::CustomUserModel,
        Feature::Postgres,
        Feature::Frontend,
    ];

    /// Flag name used on the command line
    pub fn flag(&self) -> &'static str {
        match self {
            Feature::ApiRouter => "api-router",
            Feature::AuthToken => "auth-token",
            Feature::CrossOrigin => "cors",
            Feature::CustomUserModel => "custom-user",
            Feature::Postgres => "postgres",
            Feature::Frontend => "frontend",
        }
    }

    /// Question shown by the interactive prompt
    pub fn prompt(&self) -> &'static str {
        match self {
            Feature::ApiRouter => "Include Django Ninja API router?",
            Feature::AuthToken => "Include Django REST framework with token auth?",
            Feature::CrossOrigin => "Include CORS headers?",
            Feature::CustomUserModel => "Include custom user model?",
            Feature::Postgres => "Use PostgreSQL?",
            Feature::Frontend => "Scaffold a Next.js frontend?",
        }
    }

    /// Answer pre-selected by the interactive prompt
    pub fn default_enabled(&self) -> bool {
        !matches!(self, Feature::Postgres | Feature::Frontend)
    }

    /// Python packages this feature installs
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            Feature::ApiRouter => &["django-ninja"],
            Feature::AuthToken => &["djangorestframework"],
            Feature::CrossOrigin => &["django-cors-headers"],
            Feature::CustomUserModel => &[],
            Feature::Postgres => &["psycopg2"],
            Feature::Frontend => &[],
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl FromStr for Feature {
    type Err = UserInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api-router" | "api" | "ninja" => Ok(Feature::ApiRouter),
            "auth-token" | "rest" | "drf" => Ok(Feature::AuthToken),
            "cors" | "cross-origin" => Ok(Feature::CrossOrigin),
            "custom-user" | "users" => Ok(Feature::CustomUserModel),
            "postgres" | "postgresql" | "pg" => Ok(Feature::Postgres),
            "frontend" | "nextjs" | "next" => Ok(Feature::Frontend),
            other => Err(UserInputError::UnknownFeature(other.to_string())),
        }
    }
}

/// How one feature relates to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Requires,
    Excludes,
}

/// One entry of the constraint table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub feature: Feature,
    pub relation: Relation,
    pub other: Feature,
}

/// Built-in constraint table
pub const CONSTRAINTS: &[Constraint] = &[];

/// Validated feature set with its derived package list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSelection {
    features: BTreeSet<Feature>,
    packages: Vec<String>,
}

impl FeatureSelection {
    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Selected features in declaration order
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.features.iter().copied()
    }

    /// Packages to install, first-seen order, no duplicates
    pub fn packages(&self) -> &[String] {
        &self.packages
    }
}

/// Turns requested flags into a [`FeatureSelection`]
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector<'a> {
    constraints: &'a [Constraint],
}

impl Default for FeatureSelector<'static> {
    fn default() -> Self {
        Self {
            constraints: CONSTRAINTS,
        }
    }
}

impl<'a> FeatureSelector<'a> {
    pub fn with_constraints(constraints: &'a [Constraint]) -> Self {
        Self { constraints }
    }

    /// Validate the requested flags and derive the package list.
    ///
    /// Extra packages are appended after the feature packages; duplicates are
    /// dropped wherever they occur.
    pub fn select<S: AsRef<str>>(
        &self,
        requested: &[Feature],
        extra_packages: &[S],
    ) -> Result<FeatureSelection, UserInputError> {
        let features: BTreeSet<Feature> = requested.iter().copied().collect();

        for constraint in self.constraints {
            if !features.contains(&constraint.feature) {
                continue;
            }
            match constraint.relation {
                Relation::Excludes if features.contains(&constraint.other) => {
                    return Err(UserInputError::ConfigurationConflict {
                        first: constraint.feature,
                        second: constraint.other,
                    });
                }
                Relation::Requires if !features.contains(&constraint.other) => {
                    return Err(UserInputError::MissingRequirement {
                        feature: constraint.feature,
                        required: constraint.other,
                    });
                }
                _ => {}
            }
        }

        let mut packages: Vec<String> = Vec::new();
        let candidates = CORE_PACKAGES
            .iter()
            .copied()
            .chain(features.iter().flat_map(|f| f.packages().iter().copied()))
            .chain(extra_packages.iter().map(|p| p.as_ref().trim()));
        for package in candidates {
            if !package.is_empty() && !packages.iter().any(|p| p == package) {
                packages.push(package.to_string());
            }
        }

        Ok(FeatureSelection { features, packages })
    }
}

/// Parse a list of flag names, failing on the first unknown one
pub fn parse_features<S: AsRef<str>>(names: &[S]) -> Result<Vec<Feature>, UserInputError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_features() -> impl Strategy<Value = Vec<Feature>> {
        prop::collection::vec(prop::sample::select(Feature::ALL.to_vec()), 0..10)
    }

    fn arb_packages() -> impl Strategy<Value = Vec<String>> {
        let known = vec!["django", "psycopg2", "django-ninja", "requests", "pillow", "", "  "];
        prop::collection::vec(
            prop_oneof![
                prop::sample::select(known).prop_map(String::from),
                "[a-z][a-z0-9-]{0,8}",
                " [a-z]{1,6} ",
            ],
            0..8,
        )
    }

    proptest! {
        #[test]
        fn packages_are_unique_in_first_seen_order(
            features in arb_features(),
            extras in arb_packages(),
        ) {
            let selection = FeatureSelector::default()
                .select(&features, extras.as_slice())
                .unwrap();
            let packages = selection.packages();

            for (i, package) in packages.iter().enumerate() {
                prop_assert!(!packages[..i].contains(package), "duplicate {}", package);
                prop_assert!(!package.is_empty());
                prop_assert_eq!(package.trim(), package.as_str());
            }
            prop_assert_eq!(&packages[..CORE_PACKAGES.len()], CORE_PACKAGES);

            for feature in &features {
                prop_assert!(selection.has(*feature));
                for package in feature.packages() {
                    prop_assert!(packages.iter().any(|p| p == package));
                }
            }

            // Extras follow the feature packages in the order they were first given
            let from_features: usize = Feature::ALL
                .iter()
                .filter(|f| features.contains(*f))
                .map(|f| f.packages().len())
                .sum();
            let trimmed: Vec<&str> = extras.iter().map(|e| e.trim()).collect();
            let first_seen: Vec<Option<usize>> = packages[CORE_PACKAGES.len() + from_features..]
                .iter()
                .map(|p| trimmed.iter().position(|e| e == p))
                .collect();
            prop_assert!(first_seen.iter().all(Option::is_some));
            prop_assert!(first_seen.windows(2).all(|w| w[0] < w[1]));
            for extra in trimmed.iter().filter(|e| !e.is_empty()) {
                prop_assert!(packages.iter().any(|p| p == extra), "missing {}", extra);
            }
        }

        #[test]
        fn selection_ignores_request_order(
            features in arb_features(),
            extras in arb_packages(),
        ) {
            let reversed: Vec<Feature> = features.iter().rev().copied().collect();
            let a = FeatureSelector::default().select(&features, extras.as_slice()).unwrap();
            let b = FeatureSelector::default().select(&reversed, extras.as_slice()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
