//! Concrete `SearchProvider` implementations against real literature and
//! trial registries. Each follows the teacher's HTTP client shape: a shared
//! `reqwest_middleware::ClientWithMiddleware`, a `Cow<'static, str>` base URL
//! overridable via an env var, and a bounded-body JSON GET helper. None of
//! these get special-cased by the Dispatcher or Orchestrator; they only
//! implement the uniform `search(query, max_results)` contract.

mod clinicaltrials;
mod europepmc;
mod openalex;
mod pubmed;
pub mod support;

pub use clinicaltrials::ClinicalTrialsProvider;
pub use europepmc::EuropePmcProvider;
pub use openalex::OpenAlexProvider;
pub use pubmed::PubMedProvider;
