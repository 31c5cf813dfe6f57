mod signature;

pub use signature::WebhookSignatureFactory;
