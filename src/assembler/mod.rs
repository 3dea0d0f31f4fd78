
use std::fs;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::chunk_corpus;
use crate::embeddings::{CacheState, EmbeddingCache, EmbeddingClient, EmbeddingRecord};
use crate::generation::{GenerationClient, GenerationError};
use crate::retrieval::rank;

/// Retrieved segments kept per query
pub const TOP_K: usize = 3;

const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";

// User-facing failure strings. Internal diagnostic detail (status codes,
// raw bodies) goes to the logs, never to the user.
pub const MSG_MISSING_API_KEY: &str =
    "API key missing. Set GEMINI_API_KEY in the environment and try again.";
pub const MSG_HEAVY_LOAD: &str =
    "The system is under heavy load right now. Please try again later.";
pub const MSG_UNREADABLE: &str =
    "The response could not be read. Please try rephrasing your message.";

const SYSTEM_INSTRUCTION: &str = "You are an expert Ottoman Turkish scribe. \
    Convert modern Turkish (Latin) into Ottoman Arabic script. \
    Return only the Ottoman-script text; no explanations. \
    When the reference is silent, convert deterministically.";

const CONTEXT_HEADER: &str = "Reference excerpts about orthography. \
    Where the excerpts disagree, the rule that appears later overrides the earlier one:";

/// Orchestrates one user query: embed, rank, assemble the prompt, generate.
/// Holds read-only access to the corpus embeddings built at startup, so
/// concurrent queries never contend.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    embedder: EmbeddingClient,
    generator: GenerationClient,
    records: Vec<EmbeddingRecord>,
}

impl ContextAssembler {
    #[inline]
    pub fn new(
        embedder: EmbeddingClient,
        generator: GenerationClient,
        records: Vec<EmbeddingRecord>,
    ) -> Self {
        Self {
            embedder,
            generator,
            records,
        }
    }

    /// Answer one user query. Never fails outward: every failure maps to
    /// one of the fixed user-facing strings.
    #[inline]
    pub async fn answer(&self, query: &str) -> String {
        let context = match self.embedder.embed_query(query).await {
            Ok(vector) => rank(&vector, &self.records, TOP_K),
            Err(e) => {
                // Availability over context richness: a failed query
                // embedding degrades to instructions-only generation.
                warn!("Query embedding failed, proceeding without context: {e:#}");
                Vec::new()
            }
        };

        if context.is_empty() {
            debug!("No relevant context for this query");
        } else {
            debug!("Retrieved {} context segments", context.len());
        }

        let prompt = build_prompt(query, &context);

        match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(GenerationError::Unreadable) => {
                warn!("Generation produced no readable candidate text");
                MSG_UNREADABLE.to_string()
            }
            Err(GenerationError::Exhausted { attempts }) => {
                warn!("Generation gave up after {attempts} attempts");
                MSG_HEAVY_LOAD.to_string()
            }
        }
    }
}

/// Load the persisted embeddings, or regenerate them from the corpus when
/// the cache is absent or malformed. Regeneration is always full; any
/// failure along the way falls back to an empty record set so queries can
/// still run with instructions-only prompts.
#[inline]
pub async fn ensure_records(config: &Config, client: &EmbeddingClient) -> Vec<EmbeddingRecord> {
    let cache = EmbeddingCache::new(config.cache_file_path());

    if let CacheState::Valid(records) = cache.load() {
        return records;
    }

    let Some(corpus_path) = &config.corpus_path else {
        warn!("No corpus file configured, continuing without context retrieval");
        return Vec::new();
    };

    let corpus = match fs::read_to_string(corpus_path) {
        Ok(corpus) => corpus,
        Err(e) => {
            warn!(
                "Could not read corpus at {}, continuing without context retrieval: {e}",
                corpus_path.display()
            );
            return Vec::new();
        }
    };

    let segments = chunk_corpus(&corpus, &config.chunking);
    info!("Regenerating embeddings for {} corpus segments", segments.len());

    match client.embed_segments(&segments).await {
        Ok(records) => {
            if records.is_empty() {
                warn!("Corpus embedding produced no records");
            } else if let Err(e) = cache.save(&records) {
                // Non-fatal: the in-memory records stay usable for this
                // process lifetime.
                warn!("Could not persist embedding cache: {e:#}");
            }
            records
        }
        Err(e) => {
            warn!("Corpus embedding failed, continuing with an empty cache: {e:#}");
            Vec::new()
        }
    }
}

/// Assemble the final prompt: instructions, the retrieved excerpts verbatim
/// when there are any, then the text to convert.
fn build_prompt(query: &str, context: &[String]) -> String {
    if context.is_empty() {
        format!("{SYSTEM_INSTRUCTION}\n\nText to convert:\n{query}")
    } else {
        format!(
            "{SYSTEM_INSTRUCTION}\n\n{CONTEXT_HEADER}\n{}\n\nText to convert:\n{query}",
            context.join(SEGMENT_SEPARATOR)
        )
    }
}
