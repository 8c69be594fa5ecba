use super::rule::PathRule;
use crate::properties::PropertyMap;
use url::Url;

/// Merge the properties of every rule matching `url`, in list order.
///
/// Later matches overwrite earlier ones key by key. No specificity ranking is
/// applied: whoever writes the configuration puts overrides last.
pub fn resolve(url: &Url, rules: &[PathRule]) -> PropertyMap {
    let mut merged = PropertyMap::new();
    for rule in rules.iter().filter(|rule| rule.matches(url)) {
        merged.merge_from(rule.properties());
    }
    merged
}
