/**
 * WIRE CODEC - Protocole ligne agent↔coordinateur
 *
 * RÔLE :
 * Ce module décode une ligne entrante en message typé et encode les
 * réponses du coordinateur. Une ligne = un message, lisible par un humain.
 *
 * FONCTIONNEMENT :
 * - Rapport de statut : objet JSON ({"clientId":...,"cpuLoad":...})
 * - Approbation / screenshot : tokens clé=valeur (APPROVAL clientId=x ...)
 * - Réponses : "OK" (ack nu) ou "CMD:<NAME>" (directive)
 *
 * CONTRAT :
 * Le décodage est best-effort et n'échoue JAMAIS la connexion : un payload
 * malformé ou tronqué dégrade en champs inconnus (None) ou en Unrecognized
 * (traité comme heartbeat). Les champs numériques absents restent None,
 * jamais zéro, pour distinguer inconnu de zéro en aval.
 * Aucune validation d'identité de l'émetteur n'est faite ici.
 */

use crate::models::StatusReport;
use serde_json::Value;

/// Message entrant classifié depuis une ligne agent
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Report(StatusReport),
    Approval(Approval),
    Screenshot(Screenshot),
    Unrecognized,
}

/// Réponse d'approbation (APPROVAL clientId=x action=monitoring granted=bool)
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub client_id: String,
    pub action: String,
    pub granted: bool,
}

/// Résultat screenshot (SCREENSHOT clientId=x granted=bool [format= data= reason=])
/// Consommé par le flux de contrôle agent, pas par la logique cœur.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub client_id: String,
    pub granted: bool,
    pub format: Option<String>,
    pub data: Option<String>,
    pub reason: Option<String>,
}

/// Message sortant vers l'agent
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Ack,
    Command(String),
}

/// Décode une ligne entrante. Ne retourne jamais d'erreur : tout ce qui
/// n'est pas classifiable devient Unrecognized (heartbeat).
pub fn decode(line: &str) -> Inbound {
    if let Some(rest) = line.strip_prefix("APPROVAL ") {
        if let Some(client_id) = extract_token(rest, "clientId") {
            return Inbound::Approval(Approval {
                client_id,
                action: extract_token(rest, "action").unwrap_or_default(),
                granted: extract_token(rest, "granted")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            });
        }
        return Inbound::Unrecognized;
    }

    if let Some(rest) = line.strip_prefix("SCREENSHOT ") {
        if let Some(client_id) = extract_token(rest, "clientId") {
            return Inbound::Screenshot(Screenshot {
                client_id,
                granted: extract_token(rest, "granted")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                format: extract_token(rest, "format"),
                data: extract_token(rest, "data"),
                reason: extract_token(rest, "reason"),
            });
        }
        return Inbound::Unrecognized;
    }

    match decode_report(line) {
        Some(report) => Inbound::Report(report),
        None => Inbound::Unrecognized,
    }
}

/// Encode une réponse en ligne (sans le '\n' terminal)
pub fn encode(msg: &Outbound) -> String {
    match msg {
        Outbound::Ack => "OK".to_string(),
        Outbound::Command(name) => format!("CMD:{name}"),
    }
}

/// Extraction best-effort d'un rapport de statut. Exige un clientId non
/// vide ; tous les autres champs sont indépendamment optionnels.
fn decode_report(line: &str) -> Option<StatusReport> {
    // Chemin nominal : le payload est du JSON bien formé
    if let Ok(value) = serde_json::from_str::<Value>(line) {
        let client_id = value.get("clientId")?.as_str()?.to_string();
        if client_id.is_empty() {
            return None;
        }
        return Some(StatusReport {
            client_id,
            ts: value.get("ts").and_then(Value::as_i64),
            cpu_load: value.get("cpuLoad").and_then(Value::as_f64),
            ram_used_mb: value.get("ramUsedMb").and_then(Value::as_i64),
            ram_total_mb: value.get("ramTotalMb").and_then(Value::as_i64),
            process_count: value
                .get("processes")
                .and_then(Value::as_array)
                .map(|procs| procs.len() as u32)
                .unwrap_or(0),
        });
    }

    // Payload tronqué ou malformé : scan champ par champ, ce qui est
    // illisible reste inconnu
    let client_id = extract_string(line, "clientId")?;
    if client_id.is_empty() {
        return None;
    }
    Some(StatusReport {
        client_id,
        ts: extract_i64(line, "ts"),
        cpu_load: extract_f64(line, "cpuLoad"),
        ram_used_mb: extract_i64(line, "ramUsedMb"),
        ram_total_mb: extract_i64(line, "ramTotalMb"),
        process_count: count_occurrences(line, "\"pid\":"),
    })
}

/// Valeur d'un token clé=valeur (délimité par espace ou fin de ligne)
fn extract_token(line: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=");
    let idx = line.find(&needle)?;
    let rest = &line[idx + needle.len()..];
    let end = rest.find(' ').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Valeur d'un champ string JSON, avec inversion de l'échappement agent
/// (\\, \", \n, \r, \t — un échappement inconnu laisse passer le caractère).
/// Retourne None si la string n'est pas terminée (payload tronqué).
fn extract_string(json: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\":\"");
    let idx = json.find(&needle)?;
    let mut out = String::new();
    let mut chars = json[idx + needle.len()..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '"' => return Some(out),
            other => out.push(other),
        }
    }
    None
}

fn extract_i64(json: &str, key: &str) -> Option<i64> {
    extract_number_token(json, key)?.parse().ok()
}

fn extract_f64(json: &str, key: &str) -> Option<f64> {
    extract_number_token(json, key)?.parse().ok()
}

/// Token numérique brut après "key": (chiffres, '.', '-')
fn extract_number_token<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\":");
    let idx = json.find(&needle)?;
    let rest = &json[idx + needle.len()..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

fn count_occurrences(text: &str, token: &str) -> u32 {
    text.matches(token).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_report() {
        let line = r#"{"clientId":"a1","ts":1000,"cpuLoad":0.25,"ramUsedMb":512,"ramTotalMb":1024,"processes":[{"pid":1,"cmd":"init"}]}"#;
        match decode(line) {
            Inbound::Report(report) => {
                assert_eq!(report.client_id, "a1");
                assert_eq!(report.ts, Some(1000));
                assert_eq!(report.cpu_load, Some(0.25));
                assert_eq!(report.ram_used_mb, Some(512));
                assert_eq!(report.ram_total_mb, Some(1024));
                assert_eq!(report.process_count, 1);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn missing_fields_stay_unknown_not_zero() {
        let line = r#"{"clientId":"a1","ts":1000}"#;
        match decode(line) {
            Inbound::Report(report) => {
                assert_eq!(report.cpu_load, None);
                assert_eq!(report.ram_used_mb, None);
                assert_eq!(report.ram_total_mb, None);
                assert_eq!(report.process_count, 0);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn truncated_json_degrades_field_by_field() {
        // payload coupé en plein milieu de l'array processes
        let line = r#"{"clientId":"a1","cpuLoad":0.5,"ramUsedMb":512,"processes":[{"pid":1,"cmd":"in"#;
        match decode(line) {
            Inbound::Report(report) => {
                assert_eq!(report.client_id, "a1");
                assert_eq!(report.cpu_load, Some(0.5));
                assert_eq!(report.ram_used_mb, Some(512));
                assert_eq!(report.ram_total_mb, None);
                assert_eq!(report.process_count, 1);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn escaped_strings_are_unescaped() {
        let line = r#"{"clientId":"a\\b\"c\nd\te"}"#;
        match decode(line) {
            Inbound::Report(report) => assert_eq!(report.client_id, "a\\b\"c\nd\te"),
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn empty_or_missing_client_id_is_unrecognized() {
        assert_eq!(decode(r#"{"clientId":"","ts":1}"#), Inbound::Unrecognized);
        assert_eq!(decode(r#"{"ts":1}"#), Inbound::Unrecognized);
        assert_eq!(decode("ping"), Inbound::Unrecognized);
        assert_eq!(decode(""), Inbound::Unrecognized);
    }

    #[test]
    fn decode_approval_line() {
        let msg = decode("APPROVAL clientId=a1 action=monitoring granted=true");
        assert_eq!(
            msg,
            Inbound::Approval(Approval {
                client_id: "a1".into(),
                action: "monitoring".into(),
                granted: true,
            })
        );
        // granted absent ou invalide = refus
        match decode("APPROVAL clientId=a1 action=monitoring") {
            Inbound::Approval(a) => assert!(!a.granted),
            other => panic!("expected approval, got {other:?}"),
        }
        // sans clientId, la ligne redevient un heartbeat
        assert_eq!(decode("APPROVAL action=monitoring granted=true"), Inbound::Unrecognized);
    }

    #[test]
    fn decode_screenshot_line() {
        match decode("SCREENSHOT clientId=a1 granted=false reason=headless") {
            Inbound::Screenshot(shot) => {
                assert_eq!(shot.client_id, "a1");
                assert!(!shot.granted);
                assert_eq!(shot.reason.as_deref(), Some("headless"));
                assert_eq!(shot.data, None);
            }
            other => panic!("expected screenshot, got {other:?}"),
        }
    }

    #[test]
    fn encode_replies() {
        assert_eq!(encode(&Outbound::Ack), "OK");
        assert_eq!(encode(&Outbound::Command("REQUEST_MONITORING".into())), "CMD:REQUEST_MONITORING");
    }
}
