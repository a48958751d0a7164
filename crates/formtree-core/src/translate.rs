///
/// Translator
///
/// Label lookup seam. The engine only asks for strings by key; catalog
/// format and locale negotiation stay with the host.
///

pub trait Translator {
    fn get(&self, key: &str) -> String;
}

///
/// NoTranslate
///
/// Identity translator: returns the key itself. The default when the host
/// installs nothing.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoTranslate;

impl Translator for NoTranslate {
    fn get(&self, key: &str) -> String {
        key.to_string()
    }
}
