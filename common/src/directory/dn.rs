//! Distinguished name helpers. Only splitting is supported, no normalisation
//! beyond case folding.

/// Splits a DN into its relative components, honouring `\,` escapes.
pub fn rdns(dn: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    let mut start: usize = 0;
    let mut escaped: bool = false;

    for (idx, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(dn[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < dn.len() || !parts.is_empty() {
        parts.push(dn[start..].trim());
    }
    parts
}

/// Value part of a single RDN, `DC=corp.local` gives `corp.local`.
pub fn rdn_value(rdn: &str) -> &str {
    rdn.split_once('=').map(|(_, value)| value).unwrap_or(rdn)
}

/// Value of the `idx`-th RDN, counting from the leaf.
pub fn nth_value(dn: &str, idx: usize) -> Option<&str> {
    rdns(dn).get(idx).copied().map(rdn_value)
}

/// The DN one level up, `None` for a single-component DN.
pub fn parent(dn: &str) -> Option<&str> {
    let mut escaped: bool = false;
    for (idx, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => return Some(dn[idx + 1..].trim_start()),
            _ => {}
        }
    }
    None
}

/// `true` when `dn` equals `base` or sits anywhere below it.
pub fn is_within(dn: &str, base: &str) -> bool {
    let dn_parts: Vec<&str> = rdns(dn);
    let base_parts: Vec<&str> = rdns(base);
    if base_parts.len() > dn_parts.len() {
        return false;
    }
    let offset: usize = dn_parts.len() - base_parts.len();
    dn_parts[offset..]
        .iter()
        .zip(&base_parts)
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_DN: &str =
        "DC=www,DC=corp.local,CN=MicrosoftDNS,DC=DomainDnsZones,DC=corp,DC=local";

    #[test]
    fn splits_components() {
        assert_eq!(nth_value(RECORD_DN, 0), Some("www"));
        assert_eq!(nth_value(RECORD_DN, 1), Some("corp.local"));
        assert_eq!(nth_value(RECORD_DN, 2), Some("MicrosoftDNS"));
        assert_eq!(nth_value(RECORD_DN, 9), None);
        assert!(rdns("").is_empty());
    }

    #[test]
    fn parent_drops_the_leaf() {
        assert_eq!(
            parent(RECORD_DN),
            Some("DC=corp.local,CN=MicrosoftDNS,DC=DomainDnsZones,DC=corp,DC=local")
        );
        assert_eq!(parent(r"CN=a\,b,DC=corp"), Some("DC=corp"));
        assert_eq!(parent("DC=local"), None);
    }

    #[test]
    fn keeps_escaped_commas() {
        let parts = rdns(r"CN=Smith\, John,OU=Staff,DC=corp");
        assert_eq!(parts, vec![r"CN=Smith\, John", "OU=Staff", "DC=corp"]);
    }

    #[test]
    fn subtree_membership_is_component_wise() {
        assert!(is_within(RECORD_DN, "DC=corp,DC=local"));
        assert!(is_within(RECORD_DN, "dc=DomainDnsZones,DC=CORP,DC=local"));
        assert!(is_within("DC=corp,DC=local", "DC=corp,DC=local"));
        assert!(!is_within("DC=corp,DC=local", RECORD_DN));
        assert!(!is_within("DC=xcorp,DC=local", "DC=corp,DC=local"));
    }
}
