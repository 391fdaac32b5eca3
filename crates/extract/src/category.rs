use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of entity being extracted. Selects the schema, the example
/// prompts and the image query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "roadBike")]
    RoadBike,
    #[serde(rename = "album")]
    Album,
    #[serde(rename = "recipe")]
    Recipe,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct CategoryError(pub String);

impl Category {
    pub const ALL: [Category; 3] = [Category::RoadBike, Category::Album, Category::Recipe];

    /// Name used on the wire (`schemaType`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RoadBike => "roadBike",
            Category::Album => "album",
            Category::Recipe => "recipe",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CategoryError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!("roadBike".parse::<Category>().unwrap(), Category::RoadBike);
        assert_eq!("album".parse::<Category>().unwrap(), Category::Album);
        assert_eq!(Category::Recipe.to_string(), "recipe");
        assert!("bike".parse::<Category>().is_err());
        assert!("Recipe".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_matches_from_str() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }
}
