//! Per-product prompt descriptors for the try-on edit.
//!
//! Each catalog product carries a "DNA" block describing the garment and the
//! print placement, plus per-color and per-print rules. The final prompt is
//! composed from the global constraints, the product descriptors, the logo
//! rule, and the output-resolution rule.
//!
//! Keys here must match `assets/catalog.json` exactly (e.g. `pink_glitter`
//! vs `glitter`).

/// Instructions the model must always follow, regardless of product.
const GLOBAL_CONSTRAINTS: &str = "\
HARD CONSTRAINTS (must follow):
- Edit ONLY the T-shirt. Do not change face, hair, skin texture, body proportions, pose, hands, background, lighting direction, or other clothing items.
- Keep realism: correct perspective, shadows, fabric folds, collar, seams.
- No extra text, no invented logos, no new graphics.
- Do not add or remove accessories. Do not alter pants/shorts/shoes.
- Do not add skin marks or new facial details.";

const GLOBAL_QUALITY: &str = "\
QUALITY TARGET:
- Photorealistic fashion photo, clean premium garment.
- Crisp print edges, no blur, no melting, no double printing.
- Print follows fabric folds subtly (only mild warping from real drape), never floating.";

/// The brand logo goes into the scene background, never onto the garment.
const LOGO_RULES: &str = "\
LOGO RULE (THIRD image):
- Place the provided logo ONLY in the background behind the subject as a small physical sign
  (e.g., subtle wall plaque / tiny neon sign).
- Add a violet sheen/glow, subtle and stylish. Slightly out of focus, physically plausible.
- DO NOT put the logo on the T-shirt. DO NOT add any other text or logos.";

const OUTPUT_RULES: &str = "\
OUTPUT RESOLUTION:
- Generate a single high-quality image.
- Target around 2048 px on the longest side (2K class).
- Do NOT generate 4K or ultra-high resolution.
- Focus detail primarily on the T-shirt and its print, not on the background.";

/// Prompt descriptors for one catalog product.
#[derive(Debug)]
pub struct ProductPrompt {
    pub product: &'static str,
    pub garment_dna: &'static str,
    pub placement_dna: &'static str,
    /// (color key, color rule) pairs, keyed like the catalog.
    pub colors: &'static [(&'static str, &'static str)],
    /// (print key, print rule) pairs, keyed like the catalog.
    pub prints: &'static [(&'static str, &'static str)],
}

impl ProductPrompt {
    fn color_rule(&self, color: &str) -> &'static str {
        lookup(self.colors, color)
    }

    fn print_rule(&self, print: &str) -> &'static str {
        lookup(self.prints, print)
    }
}

fn lookup(pairs: &'static [(&'static str, &'static str)], key: &str) -> &'static str {
    pairs
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or("")
}

/// Descriptor registry for every product in the catalog.
pub const PRODUCT_PROMPTS: &[ProductPrompt] = &[
    ProductPrompt {
        product: "alien_drip_t_shirt",
        garment_dna: "\
GARMENT DNA:
- Oversized streetwear T-shirt, relaxed fit, dropped shoulders, wide sleeves.
- Heavyweight cotton jersey (thick), natural drape, believable folds.
- Crew neck collar: clean, symmetrical, correct thickness, realistic rib knit.
- Hem straight, sleeves slightly boxy.",
        placement_dna: "\
PRINT PLACEMENT DNA:
- Main graphic centered on chest.
- Scale: large statement print, but not touching collar.
- Keep symmetry left/right.
- Preserve exact print proportions from reference.",
        colors: &[(
            "black",
            "\
COLOR RULE:
- Deep black fabric, not washed-out grey.
- Preserve natural highlights in folds; do not over-sharpen.",
        )],
        prints: &[
            (
                "paint",
                "\
PRINT DNA (PAINT):
- Two alien-eye shapes on chest, white paint style with dripping trails.
- Matte paint, slightly organic edges like real dried paint.
- Drips must match reference direction and length (no extra random drips).
- Strong contrast: clean white over black, premium look.",
            ),
            (
                "glitter",
                "\
PRINT DNA (GLITTER):
- Two alien-eye shapes on chest, metallic silver glitter with dripping trails.
- Glitter is dense and premium. Controlled sparkle (not noisy grain).
- Highlights respond to scene lighting subtly; keep shapes readable.
- Drips remain sharp and defined (no blur).",
            ),
        ],
    },
    ProductPrompt {
        product: "pocket_t_shirt",
        garment_dna: "\
GARMENT DNA:
- Oversized utility-style T-shirt, relaxed fit, dropped shoulders.
- Sleeve utility pockets / patches must stay visible and realistic.
- Heavy cotton jersey, structured but soft.
- Seams visible (shoulder seam, sleeve hem), realistic stitching.",
        placement_dna: "\
PRINT PLACEMENT DNA:
- Large arched 'BEVERLY' wordmark across chest.
- Arch curvature, letter spacing, and position must match reference.
- Print should not wrap unnaturally around torso; only mild fold-following.",
        colors: &[
            (
                "black",
                "\
COLOR RULE:
- Deep black fabric.
- Keep sleeve pocket detail readable (do not smear).",
            ),
            (
                "white",
                "\
COLOR RULE:
- Clean bright white fabric, not grey/yellow.
- Preserve natural shadows in folds.",
            ),
        ],
        prints: &[
            (
                "paint",
                "\
PRINT DNA (PAINT):
- Purple paint fill inside arched 'BEVERLY' wordmark.
- Matte paint texture, slightly uneven like real paint but clean edges.
- Keep letters sharp and fully readable.",
            ),
            (
                "glitter",
                "\
PRINT DNA (DARK GLITTER):
- Dark metallic glitter fill inside arched 'BEVERLY'.
- Subtle sparkle, premium dense glitter, not grainy.
- Crisp edges and strong readability.",
            ),
            (
                "pink_glitter",
                "\
PRINT DNA (PINK GLITTER):
- Bright pink glitter fill inside arched 'BEVERLY'.
- Dense glitter with controlled sparkle; avoid neon glow blobs.
- Crisp edges, readable letters.",
            ),
        ],
    },
    ProductPrompt {
        product: "pink_swaga_t_shirt",
        garment_dna: "\
GARMENT DNA:
- Oversized pastel pink T-shirt, soft cotton, relaxed streetwear fit.
- Clean crew neck collar, smooth fabric surface.
- Keep pink tone consistent with reference (no random saturation shifts).",
        placement_dna: "\
GRAPHIC PLACEMENT DNA:
- Scattered organic black blob/stripe shapes across front like patches/applique.
- Distribution and size must match reference; do not invent new blobs.
- Shapes should look intentionally placed, not random noise.",
        colors: &[(
            "pink",
            "\
COLOR RULE:
- Pastel pink base fabric. Smooth, even tone.
- Preserve realistic shading in folds; do not tint skin.",
        )],
        prints: &[
            (
                "pink_stripes",
                "\
PRINT DNA:
- Black blobs/stripes with a pink outline/trim (stitched edge feel).
- Outline thickness consistent, edges crisp.
- High quality applique look, no blur.",
            ),
            (
                "white_stripes",
                "\
PRINT DNA:
- Black blobs/stripes with a white outline/trim (stitched edge feel).
- High contrast, outline thickness consistent, edges crisp.
- No extra marks beyond reference.",
            ),
        ],
    },
    ProductPrompt {
        product: "moon_walk_t_shirt",
        garment_dna: "\
GARMENT DNA:
- Oversized black T-shirt, premium minimal aesthetic.
- Heavy cotton jersey, realistic folds, clean collar.
- No large front logos or text.",
        placement_dna: "\
TEXTURE PLACEMENT DNA:
- Lunar texture should cover the shirt fabric naturally.
- Texture follows folds smoothly; avoid loud patches or harsh edges.",
        colors: &[(
            "default",
            "\
COLOR RULE:
- Keep fabric black; lunar texture is subtle monochrome.
- Do not brighten into grey; preserve premium dark look.",
        )],
        prints: &[(
            "default",
            "\
TEXTURE DNA (LUNAR):
- Subtle moon crater / lunar surface texture embedded into the fabric.
- Low contrast, premium, futuristic, minimal.
- Should look like a high-end textile print, not a sticker.",
        )],
    },
];

/// Descriptor for `product`, if one is registered.
pub fn product_prompt(product: &str) -> Option<&'static ProductPrompt> {
    PRODUCT_PROMPTS.iter().find(|p| p.product == product)
}

/// Compose the full try-on edit prompt for a selection.
///
/// Unknown products/colors/prints degrade to empty descriptor sections rather
/// than failing — the catalog is the source of truth for what exists, and a
/// descriptor gap should not block a generation the catalog allows.
pub fn build_tryon_prompt(product: &str, color: &str, print: &str) -> String {
    let (garment_dna, placement_dna, color_rule, print_rule) = match product_prompt(product) {
        Some(p) => (
            p.garment_dna,
            p.placement_dna,
            p.color_rule(color),
            p.print_rule(print),
        ),
        None => ("", "", "", ""),
    };

    let sections = [
        "You will edit the FIRST image (the person photo).",
        "\
PRIMARY TASK:
- Replace ONLY the T-shirt on the person using the SECOND image as the exact visual reference for the shirt/print.
- Match color, print placement, scale, and orientation exactly as in the reference image.
- Keep everything else unchanged.",
        GLOBAL_CONSTRAINTS,
        GLOBAL_QUALITY,
        "GARMENT SPEC:",
        garment_dna,
        "PLACEMENT SPEC:",
        placement_dna,
        "COLOR SPEC:",
        color_rule,
        "PRINT SPEC:",
        print_rule,
        LOGO_RULES,
        OUTPUT_RULES,
    ];

    sections
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_product_has_descriptors() {
        for p in PRODUCT_PROMPTS {
            assert!(!p.garment_dna.is_empty(), "{} garment_dna", p.product);
            assert!(!p.placement_dna.is_empty(), "{} placement_dna", p.product);
            assert!(!p.colors.is_empty(), "{} colors", p.product);
            assert!(!p.prints.is_empty(), "{} prints", p.product);
        }
    }

    #[test]
    fn test_build_prompt_includes_selection_rules() {
        let prompt = build_tryon_prompt("pocket_t_shirt", "white", "pink_glitter");
        assert!(prompt.contains("utility-style T-shirt"));
        assert!(prompt.contains("Clean bright white fabric"));
        assert!(prompt.contains("PINK GLITTER"));
        assert!(prompt.contains("LOGO RULE"));
        assert!(prompt.contains("OUTPUT RESOLUTION"));
    }

    #[test]
    fn test_build_prompt_unknown_product_still_has_constraints() {
        let prompt = build_tryon_prompt("no_such_shirt", "black", "paint");
        assert!(prompt.contains("HARD CONSTRAINTS"));
        assert!(!prompt.contains("GARMENT DNA"));
    }

    #[test]
    fn test_catalog_style_keys_resolve() {
        let p = product_prompt("pocket_t_shirt").unwrap();
        assert!(!p.print_rule("pink_glitter").is_empty());
        assert!(p.print_rule("nonexistent").is_empty());
    }
}
