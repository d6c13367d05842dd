//! Built-in prompt texts
//!
//! Custom planning and section prompts stored in [`Settings`](crate::Settings)
//! replace the system prompts here; the user messages are always built in.

use kaleido_core::{SitePlan, IMAGE_SLOT};

/// System prompt for the planning call, before the schema is appended
pub const PLANNING_PROMPT: &str = "You are an avant-garde web experience architect with EXTREME creativity. Design WILDLY IMAGINATIVE, feature-rich single-page websites that push boundaries. Each site MUST be COMPLETELY DIFFERENT with unique themes, layouts, and interactions.

CRITICAL RULES:
- Make sites COMPLEX and FEATURE-PACKED (3-5 sections)
- Each section needs 3+ unique features and 2+ interactive elements
- Each section MUST have a unique `id` field (lowercase, no spaces, use hyphens, e.g., \"hero\", \"features\", \"gallery\", \"testimonials\", \"contact\")
- 40% of sites should have NO HEADER (includeHeader: false) for variety
- Vary layoutStyle dramatically each time: \"experimental\", \"minimalist\", \"maximalist\", \"brutalist\", \"glassmorphic\", \"retro\", \"futuristic\", \"organic\", \"geometric\", \"cyberpunk\", \"vaporwave\", \"swiss\", \"memphis\"
- Use BOLD, WILD, unexpected color palettes - avoid common combinations! Every palette color is a hex value like #1a2b3c
- Vary vibe dramatically: \"playful\", \"serious\", \"mysterious\", \"energetic\", \"calm\", \"chaotic\", \"elegant\", \"edgy\", \"whimsical\", \"dark\", \"light\", \"corporate\", \"artistic\", \"technical\"
- Include diverse section types: galleries, timelines, comparison tables, pricing grids, testimonials, interactive demos, data visualizations, quizzes, animations, parallax effects, carousels, accordions, tabs, modals, etc.
- IMPORTANT: slogan must be a SHORT COMPOUND WORD (e.g., \"NeonPulse\", \"CyberBloom\", \"QuantumVibe\", \"EchoFlux\") - NOT a sentence!
- Be EXTREMELY creative with themes - explore unusual concepts, niches, and ideas
- NO two sites should feel similar - maximize variation!";

/// System prompt for section calls
pub const SECTION_PROMPT: &str = "You are a MASTER front-end designer creating cutting-edge, feature-rich web sections. Output ONLY HTML markup (no wrapping <section> tags). You MUST include inline <style> and/or <script> tags to create:

- Rich interactive elements (buttons, forms, sliders, toggles, animations)
- Advanced CSS (gradients, transforms, transitions, keyframe animations, grid/flexbox layouts)
- JavaScript for interactivity (click handlers, animations, data visualization, dynamic effects)
- Creative layouts (cards, grids, timelines, comparison tables, galleries, tabs, accordions)
- Micro-interactions and delightful UX details

Make each section visually STUNNING and HIGHLY INTERACTIVE. Use the palette colors creatively. No external resources - everything inline.";

const PLAN_DEFAULT_HINT: &str = "Surprise me with something wild, unexpected, and feature-rich!";

/// Closing instruction appended to every section request
pub const SECTION_CLOSING: &str = "Create an EXCEPTIONAL, feature-rich section that implements ALL the features and interactive elements listed. Push creative boundaries!";

/// Hint given to every section after the hero
pub const CONTINUATION_HINT: &str =
    "Create a seamless transition from the previous section. Add visual interest and maintain engagement.";

/// Planning system prompt with the draft schema attached
#[must_use]
pub fn planning_system_prompt(schema: &str) -> String {
    format!("{PLANNING_PROMPT}\n\nSchema: {schema}")
}

#[must_use]
pub fn planning_user_prompt(seed: &str, hint: Option<&str>) -> String {
    let hint = non_blank(hint).unwrap_or(PLAN_DEFAULT_HINT);
    format!(
        "Seed: {seed}\n\nCreate an EXTRAORDINARY, UNIQUE single-page experience that's COMPLETELY DIFFERENT from anything you've created before. Push creative boundaries to the MAX. {hint}\n\nReturn ONLY valid JSON matching the schema."
    )
}

/// Hint for the hero section; asks for the image placeholder comment
#[must_use]
pub fn hero_hint() -> String {
    format!(
        "This is the HERO section - make it SPECTACULAR! Must include: a bold headline with animation, compelling subtext, multiple CTAs with hover effects, background gradients/animations, and the literal comment {IMAGE_SLOT} for imagery. Add scroll indicators, floating elements, or particle effects for extra polish."
    )
}

/// Contextual prompt for the hero image
#[must_use]
pub fn image_prompt(plan: &SitePlan) -> String {
    format!(
        "Create a vibrant, artistic hero image for a website with this theme:

Summary: {summary}
Vibe: {vibe}
Visual Motif: {motif}
Color Palette: {name} featuring {primary}, {secondary}, {accent}
Layout Style: {layout}

The image should be bold, eye-catching, and perfectly match this website's unique character and aesthetic.",
        summary = plan.summary,
        vibe = plan.vibe,
        motif = plan.motif,
        name = plan.palette.name,
        primary = plan.palette.primary,
        secondary = plan.palette.secondary,
        accent = plan.palette.accent,
        layout = plan.layout_style.as_deref().unwrap_or("dynamic"),
    )
}

/// System prompt for the single-pass strategy
pub const SINGLE_PASS_PROMPT: &str = r##"You are a world-class web designer creating a COMPLETE, COHESIVE single-page website in ONE unified design.

OUTPUT REQUIREMENTS:
- Return a JSON object with two fields: "plan" and "html"
- "plan" contains metadata (summary, slogan, vibe, colors, etc.)
- "html" contains the COMPLETE HTML document from <!doctype html> to </html>

DESIGN SYSTEM APPROACH:
1. Establish a consistent spacing scale (use Tailwind: space-y-4, space-y-8, space-y-16, etc.)
2. Use a unified typography hierarchy (text-sm, text-base, text-lg, text-xl, text-2xl, text-3xl, text-4xl, text-5xl)
3. Create a cohesive color system throughout
4. Use consistent component patterns (cards, buttons, grids all follow same style)
5. Maintain visual rhythm with predictable padding patterns

MANDATORY STRUCTURE:
- Include Tailwind CDN: <script src="https://cdn.tailwindcss.com"></script>
- Use sections with IDs for navigation
- Create 3-5 major sections with clear visual hierarchy
- Each section should flow naturally into the next
- Use consistent background patterns (alternating light/dark, gradients, etc.)

VISUAL COHESION:
- Pick ONE primary interaction pattern and use it throughout (e.g., all hover effects similar)
- Use ONE main layout grid system consistently
- Establish spacing rhythm: e.g., sections are py-20, cards are p-6, buttons are px-4 py-2
- Color usage: primary for CTAs, accent for highlights, text for body - stay consistent
- All cards/components should share similar border-radius, shadow, and padding

INTERACTIVITY (Add ONE <script> tag at end of body):
- Implement smooth scroll for anchor links
- Add scroll-triggered fade-ins using IntersectionObserver
- Include simple counters or progress bars
- Add hover effects consistently across all interactive elements

EXAMPLE STRUCTURE:
{
  "plan": {
    "seed": "...",
    "summary": "...",
    "slogan": "ShortName",
    "vibe": "...",
    "motif": "...",
    "palette": {
      "name": "...",
      "background": "#...",
      "surface": "#...",
      "primary": "#...",
      "secondary": "#...",
      "accent": "#...",
      "text": "#..."
    },
    "sections": [
      {"id": "hero", "title": "Hero"},
      {"id": "features", "title": "Features"},
      {"id": "showcase", "title": "Showcase"}
    ]
  },
  "html": "<!doctype html>\n<html>...</html>"
}"##;

#[must_use]
pub fn single_pass_user_prompt(seed: &str, hint: Option<&str>) -> String {
    let hint = non_blank(hint).unwrap_or("Make it visually stunning but professionally cohesive!");
    format!(
        "Seed: {seed}\n\nCreate a COMPLETE, COHESIVE single-page website with a unified design system. Ensure every element follows consistent spacing, typography, colors, and interaction patterns. {hint}\n\nReturn JSON with \"plan\" and \"html\" fields."
    )
}

/// System prompt for the template-based strategy
pub const TEMPLATE_PROMPT: &str = "You are generating content to fill predefined website templates.

OUTPUT: JSON object with these fields:
- plan: {summary, slogan, vibe, motif, palette (with 6 hex colors), sections array}
- hero: {title, subtitle, cta1, cta2}
- features: {heading, items: [{icon (emoji), title, description}]} (3-4 items)
- cta: {heading, subheading, cta}

Keep content concise and impactful. Use emojis for icons.";

#[must_use]
pub fn template_user_prompt(seed: &str, hint: Option<&str>) -> String {
    let hint = non_blank(hint).unwrap_or("modern, professional");
    format!(
        "Seed: {seed}\n\nGenerate content for a {hint} website.\n\nReturn JSON with plan, hero, features, and cta fields."
    )
}

/// Component set the component-library strategy composes from
pub const COMPONENT_LIBRARY: &str = "COMPONENT LIBRARY - Use ONLY these components:

<!-- BUTTON -->
<button class=\"btn-primary\">Text</button>
<button class=\"btn-secondary\">Text</button>
Styles: .btn-primary = px-6 py-3 bg-[var(--color-primary)] rounded-lg font-semibold hover:scale-105 transition-transform
        .btn-secondary = px-6 py-3 bg-white/10 backdrop-blur-sm rounded-lg font-semibold hover:scale-105 transition-transform

<!-- CARD -->
<div class=\"card\">
  <h3 class=\"card-title\">Title</h3>
  <p class=\"card-text\">Content</p>
</div>
Styles: .card = p-6 rounded-xl bg-white/5 border border-white/10 backdrop-blur-sm hover:bg-white/10 transition-all hover:-translate-y-1
        .card-title = text-xl font-bold mb-2
        .card-text = text-white/70

<!-- CONTAINER -->
<div class=\"container\">Content</div>
Styles: .container = max-w-6xl mx-auto px-4

<!-- SECTION -->
<div class=\"section\">Content</div>
Styles: .section = py-20

<!-- GRID -->
<div class=\"grid-2\">...</div>
<div class=\"grid-3\">...</div>
<div class=\"grid-4\">...</div>
Styles: .grid-2 = grid md:grid-cols-2 gap-6
        .grid-3 = grid md:grid-cols-3 gap-6
        .grid-4 = grid md:grid-cols-4 gap-6

<!-- HEADING -->
<h1 class=\"heading-1\">Text</h1>
<h2 class=\"heading-2\">Text</h2>
<h3 class=\"heading-3\">Text</h3>
Styles: .heading-1 = text-5xl md:text-6xl font-bold mb-6
        .heading-2 = text-4xl font-bold mb-4
        .heading-3 = text-2xl font-bold mb-3

<!-- BADGE -->
<span class=\"badge\">Text</span>
Styles: .badge = px-3 py-1 bg-[var(--color-primary)]/20 text-[var(--color-primary)] rounded-full text-sm font-medium

<!-- GRADIENT BOX -->
<div class=\"gradient-box\">Content</div>
Styles: .gradient-box = p-12 rounded-2xl bg-gradient-to-br from-[var(--color-primary)]/10 to-[var(--color-accent)]/10 border border-white/10

RULES:
- ONLY use these components
- Apply additional Tailwind utility classes as needed (spacing, sizing, flexbox, etc.)
- Combine components to create sections
- Maintain consistent spacing: use py-20 for sections, mb-8 for spacing between elements
- Use animate-on-scroll class for elements that should fade in on scroll";

/// System prompt for the component-library strategy
#[must_use]
pub fn component_system_prompt() -> String {
    format!(
        "You are composing a website using a predefined component library.

{COMPONENT_LIBRARY}

OUTPUT: JSON object with:
- plan: {{summary, slogan, vibe, motif, palette (6 hex colors), sections: [{{id, title}}]}}
- sections: array of HTML strings, each using ONLY the components above

Create 3-5 sections. Each section should:
1. Start with <div class=\"section\"><div class=\"container\">
2. Use ONLY the predefined components
3. End with </div></div>
4. Be visually distinct but consistent in style"
    )
}

#[must_use]
pub fn component_user_prompt(seed: &str, hint: Option<&str>) -> String {
    let hint = non_blank(hint).unwrap_or("professional");
    format!(
        "Seed: {seed}\n\nCompose a {hint} website using the component library.\n\nReturn JSON with plan and sections fields."
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_core::{ensure_plan, RawSitePlan};

    #[test]
    fn planning_prompt_carries_seed_and_fallback_hint() {
        let prompt = planning_user_prompt("abc123", Some("  "));
        assert!(prompt.starts_with("Seed: abc123\n\n"));
        assert!(prompt.contains(PLAN_DEFAULT_HINT));

        let prompt = planning_user_prompt("abc123", Some("a bakery for cats"));
        assert!(prompt.contains("a bakery for cats"));
        assert!(!prompt.contains(PLAN_DEFAULT_HINT));
    }

    #[test]
    fn hero_hint_names_the_image_slot() {
        assert!(hero_hint().contains(IMAGE_SLOT));
    }

    #[test]
    fn image_prompt_defaults_layout() {
        let plan = ensure_plan(RawSitePlan::default(), "s");
        let prompt = image_prompt(&plan);
        assert!(prompt.contains("Layout Style: dynamic"));
        assert!(prompt.contains(&plan.palette.primary));
    }

    #[test]
    fn component_prompt_embeds_library() {
        let prompt = component_system_prompt();
        assert!(prompt.contains("btn-primary"));
        assert!(prompt.contains("sections: [{id, title}]"));
    }
}
