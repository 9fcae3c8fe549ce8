//! Extraction of paper metadata and full text from NCBI XML payloads.

use roxmltree::{Document, Node, ParsingOptions};

use super::{Author, FullTextLink, Journal, LiteratureError, PaperSummary};

const PMC_ARTICLE_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

/// NCBI responses start with a DOCTYPE declaration.
fn parse_document(xml: &str) -> Result<Document<'_>, LiteratureError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(xml, options)?)
}

/// Parses every `PubmedArticle` of an `efetch` response.
///
/// # Errors
/// Returns an error if the payload is not well-formed XML.
pub fn parse_pubmed_articles(xml: &str) -> Result<Vec<PaperSummary>, LiteratureError> {
    let doc = parse_document(xml)?;
    let papers = doc
        .descendants()
        .filter(|node| is_element(*node, "PubmedArticle"))
        .map(parse_article)
        .collect();
    Ok(papers)
}

fn parse_article(article: Node<'_, '_>) -> PaperSummary {
    let authors = article
        .descendants()
        .filter(|node| is_element(*node, "Author"))
        .map(|author| Author {
            last_name: first_text(author, "LastName"),
            first_name: first_text(author, "ForeName"),
        })
        .collect();

    let journal_name = find(article, "Journal")
        .map(|journal| first_text(journal, "Title"))
        .unwrap_or_default();

    PaperSummary {
        pubmed_id: first_text(article, "PMID"),
        title: first_text(article, "ArticleTitle"),
        abstract_text: first_text(article, "AbstractText"),
        authors,
        journal: Journal {
            name: journal_name,
            volume: first_text(article, "Volume"),
            issue: first_text(article, "Issue"),
            pages: first_text(article, "MedlinePgn"),
        },
        publication_date: publication_date(article),
    }
}

fn publication_date(article: Node<'_, '_>) -> String {
    let Some(pub_date) = find(article, "PubDate") else {
        return String::new();
    };
    ["Year", "Month", "Day"]
        .iter()
        .filter_map(|part| {
            pub_date
                .children()
                .find(|child| is_element(*child, part))
                .map(text_of)
                .filter(|text| !text.is_empty())
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Collects PMC article pages and DOI links from an `efetch` response.
///
/// # Errors
/// Returns an error if the payload is not well-formed XML.
pub fn parse_full_text_links(xml: &str) -> Result<Vec<FullTextLink>, LiteratureError> {
    let doc = parse_document(xml)?;
    let mut links = Vec::new();

    for node in doc.descendants().filter(|node| is_element(*node, "ArticleId")) {
        if node.attribute("IdType") != Some("pmc") {
            continue;
        }
        let id = text_of(node);
        if id.is_empty() {
            continue;
        }
        let id = id.trim_start_matches("PMC");
        links.push(FullTextLink {
            kind: "PMC".to_string(),
            url: format!("{PMC_ARTICLE_URL}/PMC{id}/"),
        });
    }

    for node in doc.descendants().filter(|node| is_element(*node, "Link")) {
        if node.attribute("Provider") != Some("DOI") {
            continue;
        }
        if let Some(url) = node.attribute("URL").filter(|url| !url.is_empty()) {
            links.push(FullTextLink {
                kind: "DOI".to_string(),
                url: url.to_string(),
            });
        }
    }

    Ok(links)
}

/// Extracts plain text from a PMC OAI `GetRecord` response.
///
/// Abstract paragraphs come first, followed by section titles and paragraphs
/// of the body in document order. Returns `None` when the record has no text.
///
/// # Errors
/// Returns an error if the payload is not well-formed XML.
pub fn parse_pmc_full_text(xml: &str) -> Result<Option<String>, LiteratureError> {
    let doc = parse_document(xml)?;
    let mut blocks = Vec::new();

    if let Some(abstract_node) = doc.descendants().find(|node| is_element(*node, "abstract")) {
        blocks.extend(paragraphs(abstract_node));
    }

    if let Some(body) = doc.descendants().find(|node| is_element(*node, "body")) {
        for node in body.descendants().filter(Node::is_element) {
            let name = node.tag_name().name();
            let is_section_title =
                name == "title" && node.parent().is_some_and(|parent| is_element(parent, "sec"));
            if is_section_title || is_outer_paragraph(node) {
                let text = text_of(node);
                if !text.is_empty() {
                    blocks.push(text);
                }
            }
        }
    }

    if blocks.is_empty() {
        Ok(None)
    } else {
        Ok(Some(blocks.join("\n\n")))
    }
}

fn paragraphs(node: Node<'_, '_>) -> Vec<String> {
    node.descendants()
        .filter(|node| is_outer_paragraph(*node))
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}

/// A `p` element that is not nested inside another `p`.
fn is_outer_paragraph(node: Node<'_, '_>) -> bool {
    is_element(node, "p") && !node.ancestors().skip(1).any(|ancestor| is_element(ancestor, "p"))
}

fn is_element(node: Node<'_, '_>, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn find<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|child| is_element(*child, local_name))
}

fn first_text(node: Node<'_, '_>, local_name: &str) -> String {
    find(node, local_name).map(text_of).unwrap_or_default()
}

/// All descendant text with whitespace runs collapsed.
fn text_of(node: Node<'_, '_>) -> String {
    let raw: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFETCH: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">31452104</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <Volume>576</Volume>
            <Issue>7785</Issue>
            <PubDate><Year>2019</Year><Month>Dec</Month></PubDate>
          </JournalIssue>
          <Title>Nature</Title>
        </Journal>
        <ArticleTitle>Search-and-replace genome editing <i>without</i> double-strand breaks.</ArticleTitle>
        <Pagination><MedlinePgn>149-157</MedlinePgn></Pagination>
        <Abstract><AbstractText>Prime editing is described.</AbstractText></Abstract>
        <AuthorList>
          <Author><LastName>Anzalone</LastName><ForeName>Andrew V</ForeName></Author>
          <Author><LastName>Liu</LastName><ForeName>David R</ForeName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">31452104</ArticleId>
        <ArticleId IdType="pmc">PMC6907074</ArticleId>
      </ArticleIdList>
      <LinkSet><Link Provider="DOI" URL="https://example.org/paper.pdf"/></LinkSet>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_article_metadata() {
        let papers = parse_pubmed_articles(EFETCH).unwrap();
        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.pubmed_id, "31452104");
        assert_eq!(
            paper.title,
            "Search-and-replace genome editing without double-strand breaks."
        );
        assert_eq!(paper.abstract_text, "Prime editing is described.");
        assert_eq!(paper.authors.len(), 2);
        assert_eq!(paper.authors[1].last_name, "Liu");
        assert_eq!(paper.authors[1].first_name, "David R");
        assert_eq!(paper.journal.name, "Nature");
        assert_eq!(paper.journal.volume, "576");
        assert_eq!(paper.journal.issue, "7785");
        assert_eq!(paper.journal.pages, "149-157");
        assert_eq!(paper.publication_date, "2019-Dec");
    }

    #[test]
    fn collects_full_text_links() {
        let links = parse_full_text_links(EFETCH).unwrap();
        assert_eq!(
            links,
            vec![
                FullTextLink {
                    kind: "PMC".to_string(),
                    url: "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC6907074/".to_string(),
                },
                FullTextLink {
                    kind: "DOI".to_string(),
                    url: "https://example.org/paper.pdf".to_string(),
                },
            ]
        );
    }

    #[test]
    fn extracts_pmc_text_in_document_order() {
        let xml = r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <GetRecord><record><metadata>
    <article xmlns="https://jats.nlm.nih.gov/ns/archiving/1.3/">
      <front><article-meta><abstract><p>Abstract text.</p></abstract></article-meta></front>
      <body>
        <sec><title>Introduction</title><p>First <italic>paragraph</italic>.</p>
          <sec><title>Background</title><p>Nested paragraph.</p></sec>
        </sec>
      </body>
    </article>
  </metadata></record></GetRecord>
</OAI-PMH>"#;
        let text = parse_pmc_full_text(xml).unwrap().unwrap();
        assert_eq!(
            text,
            "Abstract text.\n\nIntroduction\n\nFirst paragraph.\n\nBackground\n\nNested paragraph."
        );
    }

    #[test]
    fn pmc_error_record_has_no_text() {
        let xml = r#"<OAI-PMH><error code="idDoesNotExist">unknown</error></OAI-PMH>"#;
        assert_eq!(parse_pmc_full_text(xml).unwrap(), None);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_pubmed_articles("<PubmedArticleSet>"),
            Err(LiteratureError::Xml(_))
        ));
    }
}
