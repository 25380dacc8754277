use std::fmt;

use serde::{
	Deserialize, Deserializer, Serialize, Serializer,
	de::{MapAccess, Visitor},
	ser::SerializeMap,
};

use crate::facts::dedupe_preserve_order;

/// Facts grouped by topic, kept in the order topics were requested.
///
/// Serializes as a JSON object whose keys appear in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFacts(Vec<(String, Vec<String>)>);
impl TopicFacts {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a bucket, replacing the facts of an existing bucket with the same topic in place.
	pub fn insert(&mut self, topic: impl Into<String>, facts: Vec<String>) {
		let topic = topic.into();

		match self.0.iter_mut().find(|(existing, _)| *existing == topic) {
			Some((_, bucket)) => *bucket = facts,
			None => self.0.push((topic, facts)),
		}
	}

	pub fn get(&self, topic: &str) -> Option<&[String]> {
		self.0.iter().find(|(existing, _)| existing == topic).map(|(_, facts)| facts.as_slice())
	}

	pub fn topics(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(topic, _)| topic.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.0.iter().map(|(topic, facts)| (topic.as_str(), facts.as_slice()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl FromIterator<(String, Vec<String>)> for TopicFacts {
	fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
		let mut out = Self::new();

		for (topic, facts) in iter {
			out.insert(topic, facts);
		}

		out
	}
}
impl Serialize for TopicFacts {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.0.len()))?;

		for (topic, facts) in &self.0 {
			map.serialize_entry(topic, facts)?;
		}

		map.end()
	}
}
impl<'de> Deserialize<'de> for TopicFacts {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct TopicFactsVisitor;
		impl<'de> Visitor<'de> for TopicFactsVisitor {
			type Value = TopicFacts;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a map of topic ids to fact lists")
			}

			fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				let mut out = TopicFacts::new();

				while let Some((topic, facts)) = access.next_entry::<String, Vec<String>>()? {
					out.insert(topic, facts);
				}

				Ok(out)
			}
		}

		deserializer.deserialize_map(TopicFactsVisitor)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
	pub facts: Vec<String>,
	pub by_topic: TopicFacts,
}

/// Merges per-topic facts into one globally de-duplicated list.
///
/// Each bucket is de-duplicated on its own first, then the flattened list is de-duplicated
/// again so a fact shared by several topics keeps its first position. `max_facts` caps only the
/// flattened list; `by_topic` always carries every de-duplicated bucket. Earlier topics win when
/// the cap cuts.
pub fn aggregate(per_topic: TopicFacts, max_facts: Option<usize>) -> Aggregate {
	let by_topic: TopicFacts = per_topic
		.0
		.into_iter()
		.map(|(topic, facts)| (topic, dedupe_preserve_order(facts)))
		.collect();
	let mut facts =
		dedupe_preserve_order(by_topic.iter().flat_map(|(_, facts)| facts.iter().cloned()));

	if let Some(max) = max_facts.filter(|max| *max > 0) {
		facts.truncate(max);
	}

	Aggregate { facts, by_topic }
}
