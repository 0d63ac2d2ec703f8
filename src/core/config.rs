use crate::core::models::{EffectiveConfig, Exclusion, ScopeConfig, SkipContext, SkipReason};

/// Merges optimization fragments from broadest to narrowest scope into
/// one immutable [`EffectiveConfig`] and decides whether a run should
/// happen at all.
pub struct ConfigResolver;

impl ConfigResolver {
    /// Merge scope fragments ordered broadest-first (built-in defaults,
    /// then project, component, function as present).
    ///
    /// A narrower scope replaces scalar and list fields outright; it
    /// never appends. An exclusion field set to `false` clears whatever
    /// a broader scope declared. An absent field leaves the broader
    /// value intact.
    pub fn resolve(scopes: &[ScopeConfig]) -> EffectiveConfig {
        let mut effective = EffectiveConfig {
            configured: !scopes.is_empty(),
            ..EffectiveConfig::default()
        };

        for scope in scopes {
            if let Some(disable) = scope.disable {
                effective.disable = disable;
            }
            if let Some(ref exclusion) = scope.exclude_stage {
                effective.exclude_stage = Self::coerce_exclusion(exclusion);
            }
            if let Some(ref exclusion) = scope.exclude_region {
                effective.exclude_region = Self::coerce_exclusion(exclusion);
            }
            if let Some(ref ext) = scope.handler_ext {
                effective.handler_ext = ext.clone();
            }
            if let Some(ref paths) = scope.include_paths {
                effective.include_paths = paths.clone();
            }
            if let Some(ref requires) = scope.requires {
                effective.requires = requires.clone();
            }
            if let Some(ref plugins) = scope.plugins {
                effective.plugins = plugins.clone();
            }
            if let Some(ref transforms) = scope.transforms {
                effective.transforms = transforms.clone();
            }
            if let Some(ref exclude) = scope.exclude {
                effective.exclude = exclude.clone();
            }
            if let Some(ref ignore) = scope.ignore {
                effective.ignore = ignore.clone();
            }
            if let Some(ref extensions) = scope.extensions {
                effective.extensions = extensions.clone();
            }
            if let Some(minify) = scope.minify {
                effective.minify = minify;
            }
        }

        effective
    }

    /// Decide whether this run should be skipped. Side-effect free and
    /// cheap; evaluated before any bundling work begins.
    pub fn should_skip(effective: &EffectiveConfig, context: &SkipContext) -> Option<SkipReason> {
        if !effective.configured {
            return Some(SkipReason::NotConfigured);
        }
        if effective.disable {
            return Some(SkipReason::Disabled);
        }
        if effective.exclude_stage.iter().any(|s| s == &context.stage) {
            return Some(SkipReason::StageExcluded(context.stage.clone()));
        }
        if effective.exclude_region.iter().any(|r| r == &context.region) {
            return Some(SkipReason::RegionExcluded(context.region.clone()));
        }
        None
    }

    fn coerce_exclusion(exclusion: &Exclusion) -> Vec<String> {
        exclusion.as_list()
    }
}
