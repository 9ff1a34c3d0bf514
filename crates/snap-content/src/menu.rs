//! Restaurant menu persisted as one JSON file per category.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ContentError, ContentResult};
use crate::persist::{read_json, to_pretty_json, write_atomic};

/// The fixed set of menu categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuCategory {
    Mains,
    Starters,
    Desserts,
    Drinks,
}

impl MenuCategory {
    /// All categories in storage and validation order.
    pub const ALL: [MenuCategory; 4] = [Self::Mains, Self::Starters, Self::Desserts, Self::Drinks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mains => "mains",
            Self::Starters => "starters",
            Self::Desserts => "desserts",
            Self::Drinks => "drinks",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for MenuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuCategory {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ContentError::Validation(format!("unknown menu category: {s}")))
    }
}

/// The whole menu. Items are free-form records kept in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuData {
    pub mains: Vec<Value>,
    pub starters: Vec<Value>,
    pub desserts: Vec<Value>,
    pub drinks: Vec<Value>,
}

impl MenuData {
    pub fn items(&self, category: MenuCategory) -> &[Value] {
        match category {
            MenuCategory::Mains => &self.mains,
            MenuCategory::Starters => &self.starters,
            MenuCategory::Desserts => &self.desserts,
            MenuCategory::Drinks => &self.drinks,
        }
    }

    pub fn items_mut(&mut self, category: MenuCategory) -> &mut Vec<Value> {
        match category {
            MenuCategory::Mains => &mut self.mains,
            MenuCategory::Starters => &mut self.starters,
            MenuCategory::Desserts => &mut self.desserts,
            MenuCategory::Drinks => &mut self.drinks,
        }
    }

    /// Validate and convert an untyped request body.
    pub fn from_value(value: &Value) -> ContentResult<Self> {
        validate_menu(value)?;
        let mut menu = MenuData::default();
        for category in MenuCategory::ALL {
            if let Some(Value::Array(items)) = value.get(category.as_str()) {
                *menu.items_mut(category) = items.clone();
            }
        }
        Ok(menu)
    }
}

/// Every category must be present and be an array.
pub fn validate_menu(value: &Value) -> ContentResult<()> {
    for category in MenuCategory::ALL {
        if !value.get(category.as_str()).is_some_and(Value::is_array) {
            return Err(ContentError::Validation(format!(
                "Invalid menu data: {category} must be an array"
            )));
        }
    }
    Ok(())
}

/// Directory holding `<category>.json` files, each shaped
/// `{"<category>": [...]}`.
#[derive(Clone, Debug)]
pub struct MenuStore {
    dir: PathBuf,
}

impl MenuStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, category: MenuCategory) -> PathBuf {
        self.dir.join(category.file_name())
    }

    pub async fn read_category(&self, category: MenuCategory) -> ContentResult<Vec<Value>> {
        let path = self.path_for(category);
        let mut file = read_json(&path).await?;
        match file.get_mut(category.as_str()).map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ContentError::Parse {
                path,
                reason: format!("expected a `{category}` array"),
            }),
        }
    }

    pub async fn write_category(&self, category: MenuCategory, items: &[Value]) -> ContentResult<()> {
        let mut wrapped = Map::new();
        wrapped.insert(category.as_str().to_string(), Value::Array(items.to_vec()));
        let bytes = to_pretty_json(&Value::Object(wrapped))?;
        write_atomic(&self.path_for(category), &bytes, ".tmp").await
    }

    pub async fn read_all(&self) -> ContentResult<MenuData> {
        let mut menu = MenuData::default();
        for category in MenuCategory::ALL {
            *menu.items_mut(category) = self.read_category(category).await?;
        }
        Ok(menu)
    }

    /// Write every category. Each file is replaced independently.
    pub async fn write_all(&self, menu: &MenuData) -> ContentResult<()> {
        for category in MenuCategory::ALL {
            self.write_category(category, menu.items(category)).await?;
        }
        info!(dir = %self.dir.display(), "menu saved");
        Ok(())
    }
}
