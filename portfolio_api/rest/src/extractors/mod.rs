pub mod contact_payload;
