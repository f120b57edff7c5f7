//! Camera name to directory segment mapping.

/// Converts a human readable camera name into the directory segment used for
/// its snapshot folder and artifact filenames.
///
/// The first whitespace separated word is lowercased, every following word is
/// titlecased, and the words are joined without a separator:
/// `"This is a Test"` becomes `"thisIsATest"`.
///
/// Only whitespace is handled. Path separators and other characters are
/// passed through unchanged; configuration validation rejects names whose
/// segment would escape the output directory.
pub fn to_path_segment(name: &str) -> String {
  let mut words = name.split_whitespace();
  let Some(first) = words.next() else {
    return String::new();
  };

  let mut segment = first.to_lowercase();
  for word in words {
    segment.push_str(&titlecase(word));
  }
  segment
}

fn titlecase(word: &str) -> String {
  let mut chars = word.chars();
  match chars.next() {
    Some(head) => head.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    None => String::new(),
  }
}
