use anyhow::{Context, Result};

use crate::backend::create_backend;
use crate::classifier::{ClassificationGate, ClassificationRequest, GateConfig};
use crate::config::MemgateConfig;

/// Run the gate once on `text` and print the decision as JSON.
pub async fn classify(config: &MemgateConfig, text: &str) -> Result<()> {
    let backend = create_backend(&config.classifier.backend())
        .context("failed to create classifier backend")?;
    let gate = ClassificationGate::new(backend, GateConfig::from_classifier_config(&config.classifier));

    let decision = gate.classify(&ClassificationRequest::from_text(text)).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
