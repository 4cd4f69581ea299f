use std::collections::HashMap;

use serde::Serialize;

/// Static descriptor for one vein-classification model and the well-known
/// endpoint it deploys to. Configuration, not runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub model_id: String,
    pub endpoint_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specs: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// The three VExUS vein models served by this deployment.
    pub fn bundled() -> Self {
        let mut specs = HashMap::new();
        specs.insert(
            "renal".to_string(),
            ModelSpec {
                model_id: "8902680778916233216".to_string(),
                endpoint_id: "1148704877514326016".to_string(),
                display_name: "VExUS - Renal Vein".to_string(),
            },
        );
        specs.insert(
            "portal".to_string(),
            ModelSpec {
                model_id: "6378976137728491520".to_string(),
                endpoint_id: "2970410926785691648".to_string(),
                display_name: "VExUS - Portal Vein".to_string(),
            },
        );
        specs.insert(
            "hepatic".to_string(),
            ModelSpec {
                model_id: "6041241350047793152".to_string(),
                endpoint_id: "8159951878260523008".to_string(),
                display_name: "VExUS - Hepatic Vein".to_string(),
            },
        );
        Self { specs }
    }

    pub fn get(&self, vein_type: &str) -> Option<&ModelSpec> {
        self.specs.get(vein_type)
    }

    /// Known type names, sorted for stable error messages.
    pub fn known_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
