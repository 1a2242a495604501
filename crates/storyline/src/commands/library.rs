//! Human-readable views of a library.

use storyline_core::Library;
use storyline_storage::JsonStorage;

/// List all stories.
pub async fn list_stories(library: &Library<JsonStorage>) -> anyhow::Result<()> {
    let stories = library.list_stories().await?;

    if stories.is_empty() {
        println!("No stories found.");
        return Ok(());
    }

    println!("{:<30} {:<40} {:>8}  Updated", "ID", "Title", "Words");
    println!("{}", "-".repeat(100));

    for story in stories {
        let title = if story.title.chars().count() > 38 {
            let truncated: String = story.title.chars().take(35).collect();
            format!("{truncated}...")
        } else {
            story.title.clone()
        };
        println!(
            "{:<30} {:<40} {:>8}  {}",
            story.id,
            title,
            story.word_count,
            story.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

/// Show a story's variations.
pub async fn show_story(library: &Library<JsonStorage>, story_id: &str) -> anyhow::Result<()> {
    let story = library.get_story(story_id).await?;
    println!("{} ({} words)", story.title, story.word_count);
    if library.has_unsaved_changes(&story).await? {
        println!("  unsaved changes");
    }
    if let Some(status) = library.merge_status(story_id).await? {
        let unresolved = status
            .conflicts
            .iter()
            .filter(|conflict| conflict.resolution.is_none())
            .count();
        println!(
            "  merging {} into {} ({unresolved} unresolved)",
            status.from_slug, status.into_slug
        );
    }
    println!();

    for variation in library.list_variations(story_id).await? {
        let marker = if variation.is_current { "*" } else { " " };
        let snapshots = library.list_snapshots(&variation.version_id).await?;
        let lineage = variation
            .parent_slug
            .map(|parent| format!(" <- {parent}"))
            .unwrap_or_default();
        println!(
            "{marker} {:<30} {:>4} snapshot(s)  {}{lineage}",
            variation.slug,
            snapshots.len(),
            variation.display_name
        );
    }

    Ok(())
}
