// ============================================================================
// Service Module
// Application-facing entry points
// ============================================================================

mod campaign_service;

pub use campaign_service::{CampaignMetrics, CampaignService, ServiceError};
