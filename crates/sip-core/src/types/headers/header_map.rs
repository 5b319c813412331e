use super::field_value::HeaderFieldValue;
use super::header_name::HeaderName;

/// All values of one header, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    pub name: HeaderName,
    pub values: Vec<HeaderFieldValue>,
}

/// Ordered multimap from header name to its field values
///
/// Entries keep the order in which each name first appeared; repeated
/// header lines with the same name append to the existing entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    fn position(&self, name: &HeaderName) -> Option<usize> {
        self.entries.iter().position(|e| e.name.matches(name))
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &HeaderName) -> Option<&[HeaderFieldValue]> {
        self.position(name).map(|i| self.entries[i].values.as_slice())
    }

    pub fn get_mut(&mut self, name: &HeaderName) -> Option<&mut Vec<HeaderFieldValue>> {
        let i = self.position(name)?;
        Some(&mut self.entries[i].values)
    }

    /// First (top-most) value of a header
    pub fn first(&self, name: &HeaderName) -> Option<&HeaderFieldValue> {
        self.get(name).and_then(|v| v.first())
    }

    pub fn first_mut(&mut self, name: &HeaderName) -> Option<&mut HeaderFieldValue> {
        self.get_mut(name).and_then(|v| v.first_mut())
    }

    /// Adds a value after any existing values of the same header
    pub fn append(&mut self, name: HeaderName, value: HeaderFieldValue) {
        match self.position(&name) {
            Some(i) => self.entries[i].values.push(value),
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    /// Adds a value in front of existing values; a new header goes first
    pub fn prepend(&mut self, name: HeaderName, value: HeaderFieldValue) {
        match self.position(&name) {
            Some(i) => self.entries[i].values.insert(0, value),
            None => self.entries.insert(
                0,
                HeaderEntry {
                    name,
                    values: vec![value],
                },
            ),
        }
    }

    /// Replaces all values of a header with a single value
    pub fn set(&mut self, name: HeaderName, value: HeaderFieldValue) {
        match self.position(&name) {
            Some(i) => self.entries[i].values = vec![value],
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    pub fn remove(&mut self, name: &HeaderName) -> Option<Vec<HeaderFieldValue>> {
        let i = self.position(name)?;
        Some(self.entries.remove(i).values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> HeaderFieldValue {
        HeaderFieldValue::text_value(s)
    }

    #[test]
    fn test_append_keeps_order() {
        let mut headers = Headers::new();
        headers.append(HeaderName::Via, text("SIP/2.0/UDP a"));
        headers.append(HeaderName::To, text("<sip:b@x>"));
        headers.append(HeaderName::Via, text("SIP/2.0/UDP b"));
        assert_eq!(headers.len(), 2);
        let vias = headers.get(&HeaderName::Via).unwrap();
        assert_eq!(vias.len(), 2);
        assert_eq!(vias[1].as_str().unwrap(), "SIP/2.0/UDP b");
    }

    #[test]
    fn test_prepend_and_set() {
        let mut headers = Headers::new();
        headers.append(HeaderName::CallId, text("abc"));
        headers.prepend(HeaderName::Via, text("SIP/2.0/UDP b"));
        headers.prepend(HeaderName::Via, text("SIP/2.0/UDP a"));
        assert_eq!(headers.iter().next().unwrap().name, HeaderName::Via);
        assert_eq!(headers.first(&HeaderName::Via).unwrap().as_str().unwrap(), "SIP/2.0/UDP a");
        headers.set(HeaderName::Via, text("SIP/2.0/TCP c"));
        assert_eq!(headers.get(&HeaderName::Via).unwrap().len(), 1);
        assert!(headers.remove(&HeaderName::CallId).is_some());
        assert!(!headers.contains(&HeaderName::CallId));
    }

    #[test]
    fn test_other_names_match_case_insensitively() {
        let mut headers = Headers::new();
        headers.append(HeaderName::Other("X-Trace".into()), text("1"));
        headers.append(HeaderName::Other("x-trace".into()), text("2"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(&HeaderName::Other("X-TRACE".into())).unwrap().len(), 2);
    }
}
