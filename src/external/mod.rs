pub mod filing_store;
