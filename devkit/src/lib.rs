/*!
# Vigil DevKit - Utilitaires pour Développement et Tests

Bibliothèque facilitant les tests du coordinateur avec:
- Faux agent parlant le protocole ligne (rapports, approbations)
- Client HTTP brut minimal pour la façade
- Builders de lignes de protocole
*/

pub mod fake_agent;
pub mod http_client;

pub use fake_agent::FakeAgent;
pub use http_client::http_request;
