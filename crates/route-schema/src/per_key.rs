use route_schema_config::SchemaKey;

/// One value for each of the three schema keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerKey<T> {
    pub query: T,
    pub body: T,
    pub reaction: T,
}

impl<T> PerKey<T> {
    pub fn from_fn(mut f: impl FnMut(SchemaKey) -> T) -> Self {
        Self {
            query: f(SchemaKey::Query),
            body: f(SchemaKey::Body),
            reaction: f(SchemaKey::Reaction),
        }
    }

    pub fn get(&self, key: SchemaKey) -> &T {
        match key {
            SchemaKey::Query => &self.query,
            SchemaKey::Body => &self.body,
            SchemaKey::Reaction => &self.reaction,
        }
    }

    pub fn get_mut(&mut self, key: SchemaKey) -> &mut T {
        match key {
            SchemaKey::Query => &mut self.query,
            SchemaKey::Body => &mut self.body,
            SchemaKey::Reaction => &mut self.reaction,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaKey, &T)> {
        SchemaKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }
}
