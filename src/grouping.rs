use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::models::Asset;

/// Case-insensitive `"city, state"` identity used to deduplicate lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn new(city: &str, state: &str) -> Self {
        Self(format!("{}, {}", city.trim(), state.trim()).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Assets sharing one `LocationKey`, before any coordinate is known.
#[derive(Debug, Clone)]
pub struct LocationGroup {
    pub key: LocationKey,
    pub city: String,
    pub state: String,
    /// Indices into the asset slice the group was built from.
    pub members: Vec<usize>,
}

impl LocationGroup {
    /// Search term for the external lookup, spelled like the first asset.
    pub fn query(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }

    pub fn is_resolvable(&self) -> bool {
        !self.city.is_empty() && !self.state.is_empty()
    }
}

/// Partitions assets by `LocationKey`, keeping first-seen order.
pub fn group_by_location(assets: &[Asset]) -> Vec<LocationGroup> {
    let mut groups: Vec<LocationGroup> = Vec::new();
    let mut index: HashMap<LocationKey, usize> = HashMap::new();

    for (i, asset) in assets.iter().enumerate() {
        let key = LocationKey::new(&asset.city, &asset.state);
        match index.get(&key) {
            Some(&slot) => groups[slot].members.push(i),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(LocationGroup {
                    key,
                    city: asset.city.trim().to_string(),
                    state: asset.state.trim().to_string(),
                    members: vec![i],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_padding() {
        assert_eq!(LocationKey::new(" Austin ", "tx"), LocationKey::new("AUSTIN", "TX "));
        assert_eq!(LocationKey::new("Austin", "TX").as_str(), "austin, tx");
    }

    #[test]
    fn duplicates_share_one_group() {
        let assets: Vec<Asset> = (0..5)
            .map(|i| Asset::new(&format!("S{i}"), "Austin", "TX"))
            .chain([Asset::new("D1", "dallas", "tx")])
            .collect();
        let groups = group_by_location(&assets);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 1, 2, 3, 4]);
        assert_eq!(groups[1].members, vec![5]);
        assert_eq!(groups[1].query(), "dallas, tx");
    }

    #[test]
    fn every_asset_lands_in_exactly_one_group() {
        let assets = vec![
            Asset::new("A", "Seattle", "WA"),
            Asset::new("B", "Austin", "TX"),
            Asset::new("C", "seattle", "wa"),
            Asset::new("D", "", "TX"),
        ];
        let groups = group_by_location(&assets);
        let mut seen: Vec<usize> = groups.iter().flat_map(|g| g.members.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(!groups.iter().find(|g| g.members == vec![3]).unwrap().is_resolvable());
    }
}
