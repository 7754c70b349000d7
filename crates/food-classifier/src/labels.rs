use crate::error::FoodClassError;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Dense class-index to class-name mapping, built once during training from
/// the class directories and persisted as `{"<index>": "<class_name>"}`.
#[derive(Debug, Clone)]
pub struct LabelMap {
	names: Vec<String>,
}

impl LabelMap {
	/// Assigns indices 0..N to the sorted subdirectory names of `root`.
	pub fn from_directory<P: AsRef<Path>>(root: P) -> Result<Self, FoodClassError> {
		let root = root.as_ref();
		let mut names = Vec::new();
		for entry in root.read_dir()? {
			let entry = entry?;
			if entry.file_type()?.is_dir() {
				names.push(entry.file_name().to_string_lossy().into_owned());
			}
		}
		if names.is_empty() {
			return Err(FoodClassError::EmptyDataset(root.display().to_string()));
		}
		names.sort();
		Ok(Self { names })
	}

	pub fn from_index_map(entries: HashMap<String, String>) -> Result<Self, FoodClassError> {
		let mut names = vec![None; entries.len()];
		for (key, name) in entries {
			let index: usize = key
				.parse()
				.map_err(|_| FoodClassError::LabelMap(format!("non-numeric index {key:?}")))?;
			match names.get_mut(index) {
				Some(slot @ None) => *slot = Some(name),
				Some(_) => {
					return Err(FoodClassError::LabelMap(format!("duplicate index {index}")));
				}
				None => {
					return Err(FoodClassError::LabelMap(format!(
						"index {index} outside [0, {})",
						names.len()
					)));
				}
			}
		}
		// Every slot is filled at this point: N distinct keys in [0, N).
		Ok(Self {
			names: names.into_iter().flatten().collect(),
		})
	}

	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FoodClassError> {
		let entries: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(path)?)?;
		Self::from_index_map(entries)
	}

	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FoodClassError> {
		let mut map = serde_json::Map::new();
		for (index, name) in self.iter() {
			map.insert(index.to_string(), Value::String(name.to_owned()));
		}
		fs::write(path, serde_json::to_string_pretty(&Value::Object(map))?)?;
		Ok(())
	}

	pub fn get(&self, index: usize) -> Option<&str> {
		self.names.get(index).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
		self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn dense_map_loads_in_index_order() {
		let map =
			LabelMap::from_index_map(entries(&[("1", "pizza"), ("0", "dosa"), ("2", "samosa")]))
				.unwrap();
		assert_eq!(map.len(), 3);
		assert_eq!(map.get(0), Some("dosa"));
		assert_eq!(map.get(1), Some("pizza"));
		assert_eq!(map.get(2), Some("samosa"));
		assert_eq!(map.get(3), None);
	}

	#[test]
	fn gap_in_indices_is_rejected() {
		let err = LabelMap::from_index_map(entries(&[("0", "dosa"), ("2", "samosa")]));
		assert!(matches!(err, Err(FoodClassError::LabelMap(_))));
	}

	#[test]
	fn non_numeric_index_is_rejected() {
		let err = LabelMap::from_index_map(entries(&[("zero", "dosa")]));
		assert!(matches!(err, Err(FoodClassError::LabelMap(_))));
	}

	#[test]
	fn save_then_load_round_trips() {
		let dir = std::env::temp_dir().join(format!("food-labels-{}", std::process::id()));
		fs::create_dir_all(&dir).unwrap();
		let path = dir.join("labels.json");

		let map = LabelMap::from_index_map(entries(&[("0", "dosa"), ("1", "pizza")])).unwrap();
		map.save(&path).unwrap();
		let reloaded = LabelMap::load(&path).unwrap();
		assert_eq!(reloaded.get(0), Some("dosa"));
		assert_eq!(reloaded.get(1), Some("pizza"));

		fs::remove_dir_all(&dir).ok();
	}
}
