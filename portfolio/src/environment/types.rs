use portfolio_core_contact_impl::ContactFeatureServiceImpl;
use portfolio_email_impl::EmailServiceImpl;
use portfolio_shared_impl::{rate_limit::RateLimitServiceImpl, time::TimeServiceImpl};
use portfolio_templates_impl::TemplateServiceImpl;

// API
pub type RestServer = portfolio_api_rest::RestServer<ContactFeature, RateLimit>;

// Email
pub type Email = EmailServiceImpl;

// Template
pub type Template = TemplateServiceImpl;

// Shared
pub type Time = TimeServiceImpl;
pub type RateLimit = RateLimitServiceImpl<Time>;

// Core
pub type ContactFeature = ContactFeatureServiceImpl<Email, Template>;
