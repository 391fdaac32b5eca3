use rand::seq::SliceRandom;

use crate::category::Category;

pub struct SchemaExamples {
    pub label: &'static str,
    pub icon: &'static str,
    pub examples: &'static [&'static str],
}

const ROAD_BIKE: SchemaExamples = SchemaExamples {
    label: "Road Bike",
    icon: "🚴",
    examples: &[
        "Canyon Ultimate CF SLX 8, 2024 racing bike. Carbon frame weighs 780g with race geometry. Shimano Ultegra Di2 12-speed electronic groupset. DT Swiss wheels with 40mm depth, tubeless ready. Full bike 7.2kg, priced at $5,500. Features include integrated cables, aerodynamic frame design, disc brakes.",
        "Specialized S-Works Tarmac SL8, 2024 racing bike. Carbon frame weighs 700g with aggressive geometry. SRAM Red eTap AXS 12-speed wireless electronic. Roval Rapide CLX II wheels with 51mm depth. 6.8kg total, $14,000. Used by pro teams, Tour de France winner bike.",
        "Massi Galant Pro, 2023 endurance bike. Aluminum frame with carbon fork, comfortable geometry. Shimano Tiagra 10-speed mechanical groupset. Alex wheels. Complete bike 9.2kg, $1,400. Entry-level road bike, perfect for beginners and casual riders.",
    ],
};

const ALBUM: SchemaExamples = SchemaExamples {
    label: "Music Album",
    icon: "🎵",
    examples: &[
        "Lemonade by Beyoncé, 2016. Visual album on Parkwood/Columbia Records. 12 tracks including 'Formation' (3:26), 'Sorry' (3:52), 'Hold Up' (3:41), 'Freedom' (4:49) featuring Kendrick Lamar. Produced by Beyoncé, The-Dream, Mike Will Made It, and others. Won 2 Grammy Awards including Best Urban Contemporary Album. 5/5 rating.",
        "Stripped by Christina Aguilera, 2002. Pop and R&B album on RCA Records. 20 tracks including 'Beautiful' (3:58), 'Fighter' (4:03), 'Dirrty' (4:58) featuring Redman. Produced by Linda Perry, Scott Storch, and others. Won Grammy Award for Best Female Pop Vocal Performance. 4.5/5 rating.",
        "4 by Beyoncé, 2011. R&B and pop album on Columbia/Parkwood Records. 12 tracks including 'Love On Top' (4:27), 'Countdown' (3:32), 'Run the World (Girls)' (3:56). Produced by Beyoncé, The-Dream, Babyface, Ryan Tedder. Debuted at number one on Billboard 200. 4.5/5 rating.",
    ],
};

const RECIPE: SchemaExamples = SchemaExamples {
    label: "Recipe",
    icon: "🍳",
    examples: &[
        "Pasta Carbonara: You'll need 400g spaghetti, 200g guanciale or pancetta, 4 eggs, 100g Pecorino Romano cheese, black pepper, salt. Cook pasta al dente. Fry guanciale until crispy. Beat eggs with grated cheese. Mix hot pasta with guanciale, remove from heat, add egg mixture quickly while tossing. Serves 4, medium difficulty, 10 min prep, 20 min cook. Italian cuisine. 600 calories per serving.",
        "Gazpacho Andaluz: Need 1kg ripe tomatoes, 1 cucumber, 1 green bell pepper, 1 small onion, 2 garlic cloves, 3 tbsp sherry vinegar, 100ml olive oil, 200g stale bread, salt, water. Blend everything until smooth, thin with cold water, chill 2-4 hours. Serves 6, easy difficulty, 15 min prep plus chilling. Spanish cuisine. 180 calories per serving.",
        "Paella Valenciana: Need 500g bomba rice, 1kg chicken pieces, 200g green beans, 200g butter beans, 4 tomatoes, 1L chicken stock, saffron, paprika, olive oil, rosemary. Brown meat, add vegetables and paprika, add rice, pour hot stock with saffron. Cook 20 minutes without stirring so the socarrat forms. Serves 6, hard difficulty, 20 min prep, 40 min cook. Spanish cuisine. 550 calories per serving.",
    ],
};

fn bank(category: Category) -> &'static SchemaExamples {
    match category {
        Category::RoadBike => &ROAD_BIKE,
        Category::Album => &ALBUM,
        Category::Recipe => &RECIPE,
    }
}

/// All sample prompts for a category
pub fn examples_for(category: Category) -> &'static [&'static str] {
    bank(category).examples
}

pub fn random_example(category: Category) -> &'static str {
    let examples = examples_for(category);
    examples.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

/// Label and icon shown by the selector
pub fn metadata(category: Category) -> (&'static str, &'static str) {
    let b = bank(category);
    (b.label, b.icon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_examples() {
        for category in Category::ALL {
            let examples = examples_for(category);
            assert!(!examples.is_empty());
            assert!(examples.iter().all(|e| !e.trim().is_empty()));
            assert!(examples.contains(&random_example(category)));
        }
    }

    #[test]
    fn test_metadata() {
        assert_eq!(metadata(Category::Album), ("Music Album", "🎵"));
        assert_eq!(metadata(Category::RoadBike).0, "Road Bike");
    }
}
